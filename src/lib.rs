//! # tunedb - Embedded Music Library Database
//!
//! tunedb indexes a media library as a tree of directories, songs, and
//! playlists, persisted to a single (optionally gzip-compressed) text file
//! and safe to share across threads behind one coarse lock. Independently
//! persisted databases can be composed into one logical namespace by
//! mounting them at tree paths.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tunedb::{Database, LibraryDatabase, Selection};
//!
//! let db = LibraryDatabase::builder()
//!     .path("/var/lib/music/db")
//!     .build()?;
//! db.open()?;
//!
//! let song = db.get_song("albums/first/track.flac")?;
//! println!("{}", song.path());
//! db.return_song(song);
//!
//! db.save()?;
//! db.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │      Public API (Database trait, facade)     │
//! ├──────────────────────────────────────────────┤
//! │  Borrow Protocol  │  Visit Engine  │ Mounts  │
//! ├──────────────────────────────────────────────┤
//! │        Directory Tree (arena + lock)         │
//! ├──────────────────────────────────────────────┤
//! │   Persistence Codec (line format, gzip)      │
//! ├──────────────────────────────────────────────┤
//! │  Staged File Replacement (tmp+fsync+rename)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! Each [`LibraryDatabase`] owns one mutex guarding its whole tree. The
//! guard is held for the duration of every traversal and released before
//! blocking file I/O and before any call into a mounted database, which
//! synchronizes independently. Saves serialize a consistent snapshot under
//! the lock and perform the file write without it.
//!
//! ## Module Overview
//!
//! - [`db`]: the facade, the mountable [`Database`] capability, the visit
//!   engine, and the borrow protocol
//! - `storage`: file format codec, gzip-aware reader, staged atomic writes
//! - [`tag`], [`song`], [`playlist`]: the value objects stored in the tree

pub mod db;
pub mod error;
pub mod playlist;
pub mod song;
mod storage;
pub mod tag;
mod tree;

pub use db::{
    Database, DatabaseBuilder, LibraryDatabase, LightDirectory, Selection, SongBorrow, SongFilter,
    Stats, Visitor,
};
pub use error::{DatabaseError, ErrorKind};
pub use playlist::PlaylistInfo;
pub use song::{LightSong, Song};
pub use tag::{Tag, TagType};
