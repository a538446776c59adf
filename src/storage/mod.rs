//! # Storage Layer
//!
//! File I/O primitives and the persistence codec for the database file.
//!
//! ## File Format
//!
//! The database is a line-oriented text file, optionally gzip-compressed.
//! A header block records the format revision and the set of tag names the
//! file may use; the body is a nested sequence of directory, song, and
//! playlist records:
//!
//! ```text
//! info_begin
//! format: 1
//! version: 0.1.0
//! tag: Artist
//! ...
//! info_end
//! directory_begin: albums
//! mtime: 1700000000
//! song_begin: track.flac
//! Title: A Title
//! Time: 215
//! song_end
//! directory_end: albums
//! ```
//!
//! ## Durability
//!
//! Writes never touch the destination file directly. [`StagedFile`] writes
//! to a temporary file in the destination's directory, flushes every layer
//! (buffer, then the optional gzip encoder, then the file itself), and
//! only then renames over the destination. A failure at any earlier point
//! leaves the previous database file untouched.
//!
//! ## Reading
//!
//! [`TextFile`] sniffs the gzip magic bytes and decompresses transparently,
//! so a database saved with compression enabled can be reopened with it
//! disabled and vice versa. Line numbers are tracked for parse errors.

pub(crate) mod codec;
mod staged;
mod text;

pub(crate) use staged::StagedFile;
pub(crate) use text::TextFile;
