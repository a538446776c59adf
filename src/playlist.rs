//! Playlist bookkeeping.

use std::time::SystemTime;

/// A playlist file registered in a directory. Only the name and the
/// modification time are tracked; the playlist's contents live in the
/// media tree, not in this database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub name: String,
    pub mtime: Option<SystemTime>,
}

impl PlaylistInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mtime: None,
        }
    }
}
