//! Minimal WebDAV client: PROPFIND, GET, PUT, MKCOL, DELETE and MOVE

use crate::error::{SyncError, SyncResult};
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use std::path::{Component, Path};
use tracing::{debug, warn};

const BACKEND: &str = "webdav";

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:resourcetype/></d:prop></d:propfind>"#;

/// Entry of a remote collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Path from the client root, `/`-separated, without leading or trailing slash
    pub path: String,
    pub is_dir: bool,
}

impl RemoteEntry {
    /// Last path segment
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// WebDAV server rooted at a base URL
#[derive(Debug, Clone)]
pub struct WebDavClient {
    client: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

impl WebDavClient {
    /// # Errors
    /// Returns a configuration error for an invalid URL or if the HTTP
    /// client cannot be built
    pub fn new(
        url: &str,
        username: Option<String>,
        password: Option<String>,
        accept_invalid_certs: bool,
    ) -> SyncResult<Self> {
        let mut base = Url::parse(url).map_err(|e| SyncError::Config(format!("invalid WebDAV url {url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| SyncError::Config(format!("can not build the HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            username,
            password,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// URL of a path below the root; a trailing `/` is kept
    fn url_for(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            let trimmed = path.trim_start_matches('/');
            if !trimmed.is_empty() {
                segments.extend(trimmed.split('/'));
            }
        }
        if path.ends_with('/') && !url.path().ends_with('/') {
            let with_slash = format!("{}/", url.path());
            url.set_path(&with_slash);
        }
        url
    }

    fn request(&self, method: &str, path: &str) -> SyncResult<RequestBuilder> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| SyncError::transport(BACKEND, format!("invalid method {method}: {e}")))?;
        let mut request = self.client.request(method, self.url_for(path));
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        Ok(request)
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        request.send().await.map_err(|e| self.connection_error(&e))
    }

    fn connection_error(&self, err: &reqwest::Error) -> SyncError {
        if err.is_connect() {
            SyncError::transport(BACKEND, format!("The connection to \"{}\" is refused.", self.base))
        } else {
            SyncError::transport(BACKEND, err.to_string())
        }
    }

    fn status_error(&self, method: &str, path: &str, status: StatusCode) -> SyncError {
        let message = match status {
            StatusCode::UNAUTHORIZED => format!("The connection to \"{}\" isn't authorized.", self.base),
            StatusCode::NOT_FOUND => format!("The url \"{}\" can't be found.", self.url_for(path)),
            other => format!("{method} {path} failed with HTTP {other}"),
        };
        SyncError::transport(BACKEND, message)
    }

    async fn expect_success(&self, method: &str, path: &str, request: RequestBuilder) -> SyncResult<Response> {
        debug!(method, path, "webdav");
        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(self.status_error(method, path, response.status()))
        }
    }

    async fn propfind(&self, path: &str, depth: &'static str) -> SyncResult<Option<String>> {
        let mut headers = HeaderMap::new();
        headers.insert("Depth", HeaderValue::from_static(depth));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));

        let request = self.request("PROPFIND", path)?.headers(headers).body(PROPFIND_BODY);
        debug!(path, depth, "webdav PROPFIND");
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| SyncError::transport(BACKEND, e.to_string()))?;
                Ok(Some(text))
            }
            status => Err(self.status_error("PROPFIND", path, status)),
        }
    }

    /// `Some(is_dir)` when the path exists
    ///
    /// # Errors
    /// Returns a transport error if the server cannot be reached or refuses
    pub async fn stat(&self, path: &str) -> SyncResult<Option<bool>> {
        let Some(body) = self.propfind(path, "0").await? else {
            return Ok(None);
        };
        let entries = parse_multistatus(&body)?;
        Ok(Some(entries.first().is_some_and(|(_, is_dir)| *is_dir)))
    }

    /// Direct children of a collection
    ///
    /// # Errors
    /// Returns a transport error if the collection cannot be listed
    pub async fn list(&self, path: &str) -> SyncResult<Vec<RemoteEntry>> {
        let dir = format!("{}/", path.trim_end_matches('/'));
        let Some(body) = self.propfind(&dir, "1").await? else {
            return Err(self.status_error("PROPFIND", path, StatusCode::NOT_FOUND));
        };

        let own = self.relative(self.url_for(&dir).path()).unwrap_or_default();
        let mut entries = Vec::new();
        for (href, is_dir) in parse_multistatus(&body)? {
            let Ok(url) = self.base.join(&href) else {
                continue;
            };
            let Some(relative) = self.relative(url.path()) else {
                warn!(%href, "skipping unsafe entry");
                continue;
            };
            if relative == own || relative.is_empty() {
                continue;
            }
            entries.push(RemoteEntry { path: relative, is_dir });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Decoded path relative to the base, without surrounding slashes
    ///
    /// `None` for a path outside the base or with a segment that is not a
    /// plain file name once decoded.
    fn relative(&self, url_path: &str) -> Option<String> {
        let base = self.base.path();
        if url_path.trim_end_matches('/') == base.trim_end_matches('/') {
            return Some(String::new());
        }
        let rest = url_path.strip_prefix(base)?;
        let segments = rest
            .trim_matches('/')
            .split('/')
            .map(decode_segment)
            .collect::<Option<Vec<_>>>()?;
        Some(segments.join("/"))
    }

    /// # Errors
    /// Returns a transport error if the file cannot be downloaded
    pub async fn get(&self, path: &str) -> SyncResult<Vec<u8>> {
        let request = self.request("GET", path)?;
        let response = self.expect_success("GET", path, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::transport(BACKEND, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// # Errors
    /// Returns a transport error if the file cannot be uploaded
    pub async fn put(&self, path: &str, content: Vec<u8>) -> SyncResult<()> {
        let request = self.request("PUT", path)?.body(content);
        self.expect_success("PUT", path, request).await.map(|_| ())
    }

    /// # Errors
    /// Returns a transport error if the collection cannot be created
    pub async fn mkcol(&self, path: &str) -> SyncResult<()> {
        let dir = format!("{}/", path.trim_end_matches('/'));
        let request = self.request("MKCOL", &dir)?;
        self.expect_success("MKCOL", &dir, request).await.map(|_| ())
    }

    /// Delete a file or a whole collection
    ///
    /// # Errors
    /// Returns a transport error if the resource cannot be deleted
    pub async fn delete(&self, path: &str) -> SyncResult<()> {
        let request = self.request("DELETE", path)?;
        self.expect_success("DELETE", path, request).await.map(|_| ())
    }

    /// Rename a resource, replacing the destination
    ///
    /// # Errors
    /// Returns a transport error if the move fails
    pub async fn rename(&self, from: &str, to: &str) -> SyncResult<()> {
        let destination = self.url_for(to);
        let mut headers = HeaderMap::new();
        headers.insert(
            "Destination",
            HeaderValue::from_str(destination.as_str())
                .map_err(|e| SyncError::transport(BACKEND, e.to_string()))?,
        );
        headers.insert("Overwrite", HeaderValue::from_static("T"));

        let request = self.request("MOVE", from)?.headers(headers);
        self.expect_success("MOVE", from, request).await.map(|_| ())
    }
}

/// `(href, is_collection)` of every response of a multistatus body
fn parse_multistatus(body: &str) -> SyncResult<Vec<(String, bool)>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut href: Option<String> = None;
    let mut is_dir = false;
    let mut in_href = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => {
                    href = None;
                    is_dir = false;
                }
                b"href" => in_href = true,
                b"collection" => is_dir = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    is_dir = true;
                }
            }
            Ok(Event::Text(text)) if in_href => {
                let value = text
                    .unescape()
                    .map_err(|e| SyncError::transport(BACKEND, format!("invalid PROPFIND response: {e}")))?;
                href = Some(value.trim().to_string());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"href" => in_href = false,
                b"response" => {
                    if let Some(href) = href.take() {
                        entries.push((href, is_dir));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SyncError::transport(
                    BACKEND,
                    format!("invalid PROPFIND response: {e}"),
                ))
            }
        }
    }

    Ok(entries)
}

/// Decode one path segment, refusing anything but a plain file name
fn decode_segment(segment: &str) -> Option<String> {
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    if decoded.contains(['/', '\\', '\0']) {
        return None;
    }
    let mut components = Path::new(decoded.as_ref()).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    plain.then(|| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/dav/sync/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/sync/profiles/</d:href>
    <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/sync/my%20notes.txt</d:href>
    <d:propstat><d:prop><d:resourcetype/></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn test_parse_multistatus() {
        let entries = parse_multistatus(LISTING).unwrap();
        assert_eq!(
            entries,
            vec![
                ("/dav/sync/".to_string(), true),
                ("/dav/sync/profiles/".to_string(), true),
                ("/dav/sync/my%20notes.txt".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_relative_paths() {
        let client = WebDavClient::new("http://localhost/dav/sync", None, None, false).unwrap();
        assert_eq!(client.relative("/dav/sync/profiles/main/").as_deref(), Some("profiles/main"));
        assert_eq!(client.relative("/dav/sync/my%20notes.txt").as_deref(), Some("my notes.txt"));
        assert_eq!(client.relative("/dav/sync/").as_deref(), Some(""));
        assert_eq!(client.relative("/dav/other/file.txt"), None);
        assert_eq!(client.url_for("/.profiles/").as_str(), "http://localhost/dav/sync/.profiles/");
        assert_eq!(
            client.url_for("profiles/a b.json").as_str(),
            "http://localhost/dav/sync/profiles/a%20b.json"
        );
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("a%20b").as_deref(), Some("a b"));
        assert_eq!(decode_segment("%e2%82%ac").as_deref(), Some("€"));
        assert_eq!(decode_segment("%ff%fe"), None);
        assert_eq!(decode_segment("..%2F..%2Fescaped.txt"), None);
        assert_eq!(decode_segment("a%5Cb"), None);
        assert_eq!(decode_segment("%2E%2E"), None);
        assert_eq!(decode_segment("."), None);
        assert_eq!(decode_segment(""), None);
    }

    #[test]
    fn test_unsafe_hrefs_are_not_relative_paths() {
        let client = WebDavClient::new("http://localhost/dav", None, None, false).unwrap();
        assert_eq!(client.relative("/dav/..%2F..%2Fescaped.txt"), None);
        assert_eq!(client.relative("/dav/profiles/%2E%2E/x"), None);
        assert_eq!(client.relative("/elsewhere/x"), None);
    }
}
