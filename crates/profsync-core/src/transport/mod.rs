//! Transport drivers: subprocesses, git, rsync and WebDAV

pub mod git;
pub mod process;
pub mod rsync;
pub mod webdav;

pub use git::Git;
pub use webdav::{RemoteEntry, WebDavClient};
