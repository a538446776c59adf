//! Song metadata tags.
//!
//! A [`Tag`] is an ordered list of `(TagType, value)` items plus an
//! optional playing time. The set of tag types is closed: the persistence
//! codec writes each type under its stable name and refuses files that
//! mention a type it does not know.

use std::fmt;
use std::time::Duration;

/// Kind of a tag item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Artist,
    AlbumArtist,
    Album,
    Title,
    Track,
    Genre,
    Date,
    Composer,
}

impl TagType {
    /// All supported tag types, in the order the codec writes them in the
    /// database header.
    pub const ALL: [TagType; 8] = [
        TagType::Artist,
        TagType::AlbumArtist,
        TagType::Album,
        TagType::Title,
        TagType::Track,
        TagType::Genre,
        TagType::Date,
        TagType::Composer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TagType::Artist => "Artist",
            TagType::AlbumArtist => "AlbumArtist",
            TagType::Album => "Album",
            TagType::Title => "Title",
            TagType::Track => "Track",
            TagType::Genre => "Genre",
            TagType::Date => "Date",
            TagType::Composer => "Composer",
        }
    }

    pub fn parse(name: &str) -> Option<TagType> {
        TagType::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to a song.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    items: Vec<(TagType, String)>,
    /// Playing time, if known.
    pub duration: Option<Duration>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item. A type may appear more than once (multiple
    /// artists, multiple genres).
    pub fn add(&mut self, tag_type: TagType, value: impl Into<String>) {
        self.items.push((tag_type, value.into()));
    }

    /// First value of the given type, if any.
    pub fn value(&self, tag_type: TagType) -> Option<&str> {
        self.items
            .iter()
            .find(|(t, _)| *t == tag_type)
            .map(|(_, v)| v.as_str())
    }

    /// All values of the given type, in insertion order.
    pub fn values(&self, tag_type: TagType) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(move |(t, _)| *t == tag_type)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagType, &str)> {
        self.items.iter().map(|(t, v)| (*t, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.duration.is_none()
    }
}
