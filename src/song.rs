//! Song entities and their exported views.

use std::time::SystemTime;

use crate::tag::Tag;

/// A song owned by exactly one directory in the tree.
///
/// The `uri` is the song's name within its directory and is unique there.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub uri: String,
    /// Modification time of the underlying media file, if known.
    pub mtime: Option<SystemTime>,
    pub tag: Tag,
}

impl Song {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mtime: None,
            tag: Tag::new(),
        }
    }

    /// Flattens this song into a [`LightSong`] rooted at `directory`
    /// (`None` for songs directly under the database root).
    pub fn export(&self, directory: Option<&str>) -> LightSong {
        LightSong {
            directory: directory.map(str::to_owned),
            uri: self.uri.clone(),
            mtime: self.mtime,
            tag: self.tag.clone(),
        }
    }
}

/// An immutable, flattened view of a song.
///
/// Unlike [`Song`], a `LightSong` carries the full path context of the
/// song at the moment it was exported and is valid independently of later
/// tree mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSong {
    /// Path of the containing directory, `None` for the root.
    pub directory: Option<String>,
    pub uri: String,
    pub mtime: Option<SystemTime>,
    pub tag: Tag,
}

impl LightSong {
    /// Full path of the song relative to the database root.
    pub fn path(&self) -> String {
        match &self.directory {
            Some(dir) => format!("{}/{}", dir, self.uri),
            None => self.uri.clone(),
        }
    }

    /// Returns a copy of this view with `prefix` prepended to its
    /// directory, used when a song crosses a mount boundary.
    pub(crate) fn prefixed(&self, prefix: &str) -> LightSong {
        let directory = match &self.directory {
            Some(dir) => Some(format!("{}/{}", prefix, dir)),
            None => Some(prefix.to_owned()),
        };
        LightSong {
            directory,
            uri: self.uri.clone(),
            mtime: self.mtime,
            tag: self.tag.clone(),
        }
    }
}
