//! # Database Module
//!
//! The public database facade and the capability interface that makes
//! databases mountable inside one another.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ LibraryDatabase (facade)                    │
//! │   open / close / check / save               │
//! │   get_song / return_song                    │
//! │   visit / get_stats / visit_unique_tags     │
//! │   mount / unmount / lock_umount_steal       │
//! ├─────────────────────────────────────────────┤
//! │ Mutex<Tree>    one guard per instance,      │
//! │                held for every traversal,    │
//! │                dropped before file I/O and  │
//! │                before cross-mount calls     │
//! ├─────────────────────────────────────────────┤
//! │ Tree           directories, songs,          │
//! │                playlists, mount points      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Mounting
//!
//! Any implementor of [`Database`] can be attached at a tree path; a
//! [`LibraryDatabase`] is itself such an implementor, so databases nest to
//! arbitrary depth. Paths crossing a mount point are translated to the
//! nested database's namespace, and results coming back are prefixed with
//! the mount path again.
//!
//! ## Borrow Protocol
//!
//! [`Database::get_song`] hands out an owned [`SongBorrow`] token that must
//! be passed back to [`Database::return_song`] exactly once. Consuming the
//! token by move makes double-returns unrepresentable; at most one local
//! borrow may be outstanding per database at a time.

mod borrow;
mod builder;
mod library;
mod mount;
mod visit;

pub use builder::DatabaseBuilder;
pub use library::LibraryDatabase;

use std::collections::{BTreeSet, HashSet};
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use eyre::Result;

use crate::playlist::PlaylistInfo;
use crate::song::LightSong;
use crate::tag::TagType;

/// Flattened view of a directory: its full path (empty for the root) and
/// its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightDirectory {
    pub uri: String,
    pub mtime: Option<SystemTime>,
}

impl LightDirectory {
    pub fn is_root(&self) -> bool {
        self.uri.is_empty()
    }
}

/// Song filter predicate used by [`Selection`].
pub type SongFilter = dyn Fn(&LightSong) -> bool + Sync;

/// Immutable descriptor of one traversal request.
#[derive(Clone, Copy)]
pub struct Selection<'a> {
    /// Target path, relative to the database root; empty for the root.
    pub uri: &'a str,
    /// Descend into subdirectories (and mounted databases) below the
    /// target.
    pub recursive: bool,
    /// Songs failing the filter are skipped; `None` accepts everything.
    pub filter: Option<&'a SongFilter>,
}

impl<'a> Selection<'a> {
    pub fn new(uri: &'a str) -> Self {
        Self {
            uri,
            recursive: false,
            filter: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_filter(mut self, filter: &'a SongFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn matches(&self, song: &LightSong) -> bool {
        self.filter.map_or(true, |f| f(song))
    }
}

/// Receiver for [`Database::visit`] events.
///
/// The `wants_*` flags replace optional callbacks: a visitor that does not
/// care about directories leaves `wants_directories` at `false` and the
/// walk will not export them. Note that `wants_songs` defaults to `true`
/// and gates the song-path case of `visit`: a visitor that declines songs
/// treats a song-shaped path as unresolvable.
pub trait Visitor {
    fn wants_directories(&self) -> bool {
        false
    }

    fn wants_songs(&self) -> bool {
        true
    }

    fn wants_playlists(&self) -> bool {
        false
    }

    fn on_directory(&mut self, _directory: &LightDirectory) -> Result<()> {
        Ok(())
    }

    fn on_song(&mut self, _song: &LightSong) -> Result<()> {
        Ok(())
    }

    fn on_playlist(&mut self, _playlist: &PlaylistInfo, _directory: &LightDirectory) -> Result<()> {
        Ok(())
    }
}

/// Aggregate statistics over a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub song_count: u64,
    /// Summed playing time of all counted songs.
    pub total_duration: Duration,
    pub artist_count: u64,
    pub album_count: u64,
}

/// An outstanding song borrow.
///
/// Dereferences to the [`LightSong`] view. The token must be given back to
/// the database it came from via [`Database::return_song`].
pub struct SongBorrow {
    pub(crate) song: LightSong,
    pub(crate) origin: BorrowOrigin,
}

pub(crate) enum BorrowOrigin {
    /// Borrowed from this database's own tree.
    Local,
    /// Borrowed through a mount point; returning the token forwards the
    /// nested borrow back to the nested database.
    Mounted {
        database: Arc<dyn Database>,
        inner: Box<SongBorrow>,
    },
}

impl std::fmt::Debug for SongBorrow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SongBorrow")
            .field("song", &self.song)
            .finish_non_exhaustive()
    }
}

impl SongBorrow {
    pub fn song(&self) -> &LightSong {
        &self.song
    }
}

impl Deref for SongBorrow {
    type Target = LightSong;

    fn deref(&self) -> &LightSong {
        &self.song
    }
}

/// The mountable database capability.
///
/// Implemented by [`LibraryDatabase`] and by anything else that can stand
/// in for a subtree of the namespace. All methods take `&self`; implementors
/// are internally synchronized.
pub trait Database: Send + Sync {
    /// Brings the database into its usable state, loading persisted
    /// content if there is any.
    fn open(&self) -> Result<()>;

    /// Tears the database down. Requires that no borrows are outstanding
    /// and that no databases remain mounted inside it.
    fn close(&self) -> Result<()>;

    /// Resolves `uri` to a song and borrows a view of it.
    fn get_song(&self, uri: &str) -> Result<SongBorrow>;

    /// Gives back a borrow obtained from [`Database::get_song`].
    fn return_song(&self, borrow: SongBorrow);

    /// Resolves `selection.uri` and feeds the selected directory, song,
    /// and playlist entries to `visitor`.
    fn visit(&self, selection: &Selection<'_>, visitor: &mut dyn Visitor) -> Result<()>;

    /// Persists the database.
    fn save(&self) -> Result<()>;

    /// Modification time of the backing file as of the last successful
    /// load or save.
    fn update_stamp(&self) -> Option<SystemTime> {
        None
    }

    /// Folds [`Database::visit`] into aggregate statistics.
    fn get_stats(&self, selection: &Selection<'_>) -> Result<Stats> {
        let mut fold = StatsFold::default();
        self.visit(selection, &mut fold)?;
        Ok(Stats {
            song_count: fold.song_count,
            total_duration: fold.total_duration,
            artist_count: fold.artists.len() as u64,
            album_count: fold.albums.len() as u64,
        })
    }

    /// Feeds every distinct value of `tag_type` among the selected songs
    /// to `visit`, in sorted order.
    fn visit_unique_tags(
        &self,
        selection: &Selection<'_>,
        tag_type: TagType,
        visit: &mut dyn FnMut(&str) -> Result<()>,
    ) -> Result<()> {
        let mut fold = UniqueTagsFold {
            tag_type,
            values: BTreeSet::new(),
        };
        self.visit(selection, &mut fold)?;
        for value in &fold.values {
            visit(value)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct StatsFold {
    song_count: u64,
    total_duration: Duration,
    artists: HashSet<String>,
    albums: HashSet<String>,
}

impl Visitor for StatsFold {
    fn on_song(&mut self, song: &LightSong) -> Result<()> {
        self.song_count += 1;
        if let Some(duration) = song.tag.duration {
            self.total_duration += duration;
        }
        for artist in song.tag.values(TagType::Artist) {
            if !self.artists.contains(artist) {
                self.artists.insert(artist.to_owned());
            }
        }
        for album in song.tag.values(TagType::Album) {
            if !self.albums.contains(album) {
                self.albums.insert(album.to_owned());
            }
        }
        Ok(())
    }
}

struct UniqueTagsFold {
    tag_type: TagType,
    values: BTreeSet<String>,
}

impl Visitor for UniqueTagsFold {
    fn on_song(&mut self, song: &LightSong) -> Result<()> {
        for value in song.tag.values(self.tag_type) {
            if !self.values.contains(value) {
                self.values.insert(value.to_owned());
            }
        }
        Ok(())
    }
}
