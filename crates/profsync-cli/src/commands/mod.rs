//! CLI command handlers
//!
//! Transfer commands live in `sync`, profile management in `profile`,
//! local editor maintenance in `editor`.

pub mod editor;
pub mod profile;
pub mod sync;
