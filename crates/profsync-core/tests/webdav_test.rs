//! WebDAV backend tests against a mock server

use profsync_core::repository::{WebDavBackend, MARKER_CONTENT};
use profsync_core::{BackendState, MemoryEditor, RepositoryBackend, SyncOptions};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// PROPFIND answer listing `(href, is_collection)` entries
fn multistatus(entries: &[(&str, bool)]) -> String {
    let responses: String = entries
        .iter()
        .map(|(href, is_dir)| {
            let kind = if *is_dir { "<d:collection/>" } else { "" };
            format!(
                "<d:response><d:href>{href}</d:href><d:propstat><d:prop>\
                 <d:resourcetype>{kind}</d:resourcetype></d:prop></d:propstat></d:response>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0" encoding="utf-8"?><d:multistatus xmlns:d="DAV:">{responses}</d:multistatus>"#)
}

fn listing(entries: &[(&str, bool)]) -> ResponseTemplate {
    ResponseTemplate::new(207).set_body_string(multistatus(entries))
}

async fn mount_propfind(server: &MockServer, at: &str, depth: &str, entries: &[(&str, bool)]) {
    Mock::given(method("PROPFIND"))
        .and(path(at))
        .and(header("Depth", depth))
        .respond_with(listing(entries))
        .mount(server)
        .await;
}

/// Root that exists and is empty
async fn mount_empty_root(server: &MockServer) {
    mount_propfind(server, "/dav/", "0", &[("/dav/", true)]).await;
    mount_propfind(server, "/dav/", "1", &[("/dav/", true)]).await;
}

/// Every other path is missing
async fn mount_missing_paths(server: &MockServer) {
    Mock::given(method("PROPFIND"))
        .and(path_regex(r"^/dav/.+"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn editor_at(dir: &Path) -> MemoryEditor {
    fs::create_dir_all(dir.join("user")).unwrap();
    MemoryEditor::new(dir.join("user"), dir.join("extensions"), dir.join("home"))
}

fn backend(server: &MockServer, storage: &Path) -> WebDavBackend {
    let url = format!("{}/dav", server.uri());
    WebDavBackend::new(storage, &url, Some("me".to_string()), Some("secret".to_string()), false, "main")
        .expect("valid url")
}

#[tokio::test]
async fn test_initialize_claims_empty_root() {
    let server = MockServer::start().await;
    mount_empty_root(&server).await;
    Mock::given(method("PUT"))
        .and(path("/dav/.profsync"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let mut webdav = backend(&server, &temp.path().join("storage"));
    webdav.initialize().await.unwrap();
    assert_eq!(webdav.state(), BackendState::Initialized);

    let requests = server.received_requests().await.unwrap();
    let marker = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .expect("marker written");
    assert_eq!(marker.body, MARKER_CONTENT.as_bytes());
    assert!(marker.headers.get("authorization").is_some());
}

#[tokio::test]
async fn test_initialize_rejects_foreign_directory() {
    let server = MockServer::start().await;
    mount_propfind(&server, "/dav/", "0", &[("/dav/", true)]).await;
    mount_propfind(&server, "/dav/", "1", &[("/dav/", true), ("/dav/notes.txt", false)]).await;

    let temp = TempDir::new().unwrap();
    let mut webdav = backend(&server, &temp.path().join("storage"));
    let err = webdav.initialize().await.unwrap_err();

    assert_eq!(err.code(), "TRANSPORT_ERROR");
    assert!(err.to_string().contains("not valid"));
    assert_eq!(webdav.state(), BackendState::Uninitialized);
}

#[tokio::test]
async fn test_initialize_accepts_marked_directory() {
    let server = MockServer::start().await;
    mount_propfind(&server, "/dav/", "0", &[("/dav/", true)]).await;
    mount_propfind(
        &server,
        "/dav/",
        "1",
        &[("/dav/", true), ("/dav/.profsync", false), ("/dav/profiles/", true)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dav/.profsync"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MARKER_CONTENT))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let mut webdav = backend(&server, &temp.path().join("storage"));
    webdav.initialize().await.unwrap();
    assert_eq!(webdav.state(), BackendState::Initialized);
}

#[tokio::test]
async fn test_missing_root_fails_initialize() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let mut webdav = backend(&server, &temp.path().join("storage"));
    let err = webdav.initialize().await.unwrap_err();
    assert!(err.to_string().contains("can't be found"));
}

#[tokio::test]
async fn test_failed_mkcol_makes_upload_fail() {
    let server = MockServer::start().await;
    mount_empty_root(&server).await;
    mount_missing_paths(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let editor = editor_at(temp.path());
    let mut webdav = backend(&server, &temp.path().join("storage"));
    webdav.initialize().await.unwrap();

    assert!(!webdav.upload(&editor, &SyncOptions::default()).await.unwrap());
    assert_eq!(webdav.state(), BackendState::Initialized);
}

#[tokio::test]
async fn test_upload_stages_then_moves_profiles() {
    let server = MockServer::start().await;
    mount_empty_root(&server).await;
    mount_missing_paths(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("MOVE"))
        .and(path("/dav/.profiles/"))
        .and(header("Destination", format!("{}/dav/profiles/", server.uri()).as_str()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let editor = editor_at(temp.path());
    fs::write(temp.path().join("user/settings.json"), "{\"a\": 1}").unwrap();

    let mut webdav = backend(&server, &temp.path().join("storage"));
    webdav.initialize().await.unwrap();
    assert!(webdav.upload(&editor, &SyncOptions::default()).await.unwrap());

    let requests = server.received_requests().await.unwrap();
    let put_paths: Vec<&str> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.url.path())
        .collect();
    assert!(put_paths.contains(&"/dav/.profiles/main/data/settings.json"));

    let mkcols: Vec<&str> = requests
        .iter()
        .filter(|r| r.method.as_str() == "MKCOL")
        .map(|r| r.url.path())
        .collect();
    assert_eq!(mkcols.first(), Some(&"/dav/.profiles/"));
    assert!(mkcols.contains(&"/dav/.profiles/main/"));
    assert!(mkcols.contains(&"/dav/.profiles/main/data/"));

    let last = requests.last().expect("requests recorded");
    assert_eq!(last.method.as_str(), "MOVE");
}

#[tokio::test]
async fn test_download_pulls_tree_and_restores() {
    let server = MockServer::start().await;
    mount_propfind(&server, "/dav/", "0", &[("/dav/", true)]).await;
    mount_propfind(
        &server,
        "/dav/",
        "1",
        &[
            ("/dav/", true),
            ("/dav/.profsync", false),
            ("/dav/.profiles/", true),
            ("/dav/profiles/", true),
        ],
    )
    .await;
    mount_propfind(&server, "/dav/profiles/", "1", &[("/dav/profiles/", true), ("/dav/profiles/main/", true)]).await;
    mount_propfind(
        &server,
        "/dav/profiles/main/",
        "1",
        &[("/dav/profiles/main/", true), ("/dav/profiles/main/data/", true)],
    )
    .await;
    mount_propfind(
        &server,
        "/dav/profiles/main/data/",
        "1",
        &[("/dav/profiles/main/data/", true), ("/dav/profiles/main/data/settings.json", false)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dav/.profsync"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MARKER_CONTENT))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dav/profiles/main/data/settings.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"remote\": true}"))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = temp.path().join("storage");
    let editor = editor_at(temp.path());
    let mut webdav = backend(&server, &storage);
    webdav.initialize().await.unwrap();

    assert!(webdav.download(&editor, &SyncOptions::default()).await.unwrap());

    let restored = fs::read_to_string(temp.path().join("user/settings.json")).unwrap();
    assert_eq!(restored, "{\"remote\": true}");
    assert!(storage.join("repository/profiles/main/data/settings.json").exists());
    assert!(!storage.join("repository/.profsync").exists());
    assert!(!storage.join("repository.incoming").exists());
}

#[tokio::test]
async fn test_unreachable_server_fails_download() {
    let server = MockServer::start().await;
    mount_empty_root(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let editor = editor_at(temp.path());
    let mut webdav = backend(&server, &temp.path().join("storage"));
    webdav.initialize().await.unwrap();

    server.reset().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(!webdav.download(&editor, &SyncOptions::default()).await.unwrap());
    assert_eq!(webdav.list_profiles().await.unwrap(), vec!["main".to_string()]);
}

#[tokio::test]
async fn test_download_skips_entries_escaping_the_working_copy() {
    let server = MockServer::start().await;
    mount_propfind(&server, "/dav/", "0", &[("/dav/", true)]).await;
    mount_propfind(
        &server,
        "/dav/",
        "1",
        &[
            ("/dav/", true),
            ("/dav/.profsync", false),
            ("/dav/..%2F..%2Fescaped.txt", false),
            ("/dav/profiles/", true),
        ],
    )
    .await;
    mount_propfind(&server, "/dav/profiles/", "1", &[("/dav/profiles/", true), ("/dav/profiles/main/", true)]).await;
    mount_propfind(
        &server,
        "/dav/profiles/main/",
        "1",
        &[("/dav/profiles/main/", true), ("/dav/profiles/main/data/", true)],
    )
    .await;
    mount_propfind(
        &server,
        "/dav/profiles/main/data/",
        "1",
        &[
            ("/dav/profiles/main/data/", true),
            ("/dav/profiles/main/data/settings.json", false),
            ("/dav/profiles/main/data/%2E%2E%5C%2E%2E%5Cnested.txt", false),
            ("/dav/profiles/other/sideways.txt", false),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dav/.profsync"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MARKER_CONTENT))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dav/profiles/main/data/settings.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"remote\": true}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"(escaped|nested|sideways)"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pwned"))
        .expect(0)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let storage = temp.path().join("storage");
    let editor = editor_at(temp.path());
    let mut webdav = backend(&server, &storage);
    webdav.initialize().await.unwrap();

    assert!(webdav.download(&editor, &SyncOptions::default()).await.unwrap());

    assert!(!temp.path().join("escaped.txt").exists());
    assert!(!storage.join("escaped.txt").exists());
    assert!(!storage.join("repository/profiles/nested.txt").exists());
    assert!(!storage.join("repository/profiles/other").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("user/settings.json")).unwrap(),
        "{\"remote\": true}"
    );
}

#[tokio::test]
async fn test_failed_reinitialize_leaves_backend_uninitialized() {
    let server = MockServer::start().await;
    mount_empty_root(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let mut webdav = backend(&server, &temp.path().join("storage"));
    webdav.initialize().await.unwrap();
    assert_eq!(webdav.state(), BackendState::Initialized);

    server.reset().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(webdav.initialize().await.is_err());
    assert_eq!(webdav.state(), BackendState::Uninitialized);
    let err = webdav.list_profiles().await.unwrap_err();
    assert_eq!(err.code(), "NOT_INITIALIZED");
}
