//! The `LibraryDatabase` facade: lifecycle, writability checks, and
//! persistence orchestration.
//!
//! The tree lives behind one `parking_lot::Mutex`, `None` while the
//! database is closed. Every traversal holds that guard; the guard is
//! dropped before any blocking file I/O and before any call into a mounted
//! database (which takes its own, independent lock).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use eyre::{bail, ensure, Result, WrapErr};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::db::{Database, Selection, SongBorrow, Visitor};
use crate::playlist::PlaylistInfo;
use crate::song::Song;
use crate::storage::{self, StagedFile, TextFile};
use crate::tree::{DirectoryId, Tree};

/// An embedded, file-backed music library database.
///
/// Construct one with [`LibraryDatabase::builder`], then [`open`] it.
/// The instance is `Send + Sync`; all methods take `&self`.
///
/// [`open`]: Database::open
pub struct LibraryDatabase {
    path: PathBuf,
    cache_directory: Option<PathBuf>,
    compress: bool,
    pub(crate) tree: Mutex<Option<Tree>>,
    mtime: Mutex<Option<SystemTime>>,
    pub(crate) borrowed_songs: AtomicU32,
}

impl std::fmt::Debug for LibraryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryDatabase")
            .field("path", &self.path)
            .field("cache_directory", &self.cache_directory)
            .field("compress", &self.compress)
            .field("borrowed_songs", &self.borrowed_songs)
            .finish_non_exhaustive()
    }
}

impl LibraryDatabase {
    pub fn builder() -> super::DatabaseBuilder {
        super::DatabaseBuilder::new()
    }

    pub(crate) fn new(path: PathBuf, cache_directory: Option<PathBuf>, compress: bool) -> Self {
        Self {
            path,
            cache_directory,
            compress,
            tree: Mutex::new(None),
            mtime: Mutex::new(None),
            borrowed_songs: AtomicU32::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn cache_directory(&self) -> Option<&Path> {
        self.cache_directory.as_deref()
    }

    pub(crate) fn compress_enabled(&self) -> bool {
        self.compress
    }

    /// Verifies that the backing file location is usable without touching
    /// it: an existing path must be a regular file openable for reading
    /// and writing; a missing path requires an existing, writable parent
    /// directory.
    pub fn check(&self) -> Result<()> {
        if !self.path.exists() {
            let parent = match self.path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let meta = fs::metadata(parent)
                .wrap_err_with(|| format!("on parent directory of database file {:?}", self.path))?;
            ensure!(
                meta.is_dir(),
                "cannot create database file {:?}: parent path is not a directory",
                self.path
            );
            ensure!(
                !meta.permissions().readonly(),
                "cannot create database file in {:?}: directory is not writable",
                parent
            );
            return Ok(());
        }

        let meta = fs::metadata(&self.path)
            .wrap_err_with(|| format!("failed to stat database file {:?}", self.path))?;
        ensure!(
            meta.is_file(),
            "database file {:?} is not a regular file",
            self.path
        );
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .wrap_err_with(|| {
                format!(
                    "cannot open database file {:?} for reading and writing",
                    self.path
                )
            })?;
        Ok(())
    }

    /// Modification time of the backing file as of the last successful
    /// load or save.
    pub fn update_stamp(&self) -> Option<SystemTime> {
        *self.mtime.lock()
    }

    pub fn open(&self) -> Result<()> {
        let mut tree = Tree::new();
        let mut mtime = None;

        if self.path.exists() {
            // a file that cannot be opened is recoverable (the location
            // just has to pass check()); content that fails to parse is
            // not, and that error propagates
            match TextFile::open(&self.path) {
                Ok(mut file) => {
                    info!(path = ?self.path, "reading database");
                    storage::codec::load(&mut file, &mut tree).wrap_err_with(|| {
                        format!("failed to load database file {:?}", self.path)
                    })?;
                    mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
                }
                Err(err) => {
                    error!("failed to open database file: {err:#}");
                    self.check()?;
                    tree = Tree::new();
                }
            }
        } else {
            debug!(path = ?self.path, "database file missing, starting empty");
            self.check()?;
        }

        let mut guard = self.tree.lock();
        ensure!(guard.is_none(), "database is already open");
        *guard = Some(tree);
        drop(guard);
        *self.mtime.lock() = mtime;
        self.borrowed_songs.store(0, Ordering::Release);
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut guard = self.tree.lock();
        let tree = match guard.take() {
            Some(tree) => tree,
            None => bail!("database is not open"),
        };
        debug_assert_eq!(
            self.borrowed_songs.load(Ordering::Acquire),
            0,
            "close with an outstanding song borrow"
        );
        debug_assert_eq!(tree.mount_count(), 0, "close with databases still mounted");
        drop(tree);
        Ok(())
    }

    /// Persists the tree: prune, sort, and serialize under the lock, then
    /// write the snapshot through a staged file and atomically replace the
    /// destination.
    pub fn save(&self) -> Result<()> {
        let snapshot = {
            let mut guard = self.tree.lock();
            let tree = match guard.as_mut() {
                Some(tree) => tree,
                None => bail!("database is not open"),
            };
            debug!("removing empty directories");
            tree.prune_empty();
            debug!("sorting database");
            tree.sort();
            let mut buffer = Vec::new();
            storage::codec::save(&mut buffer, tree)?;
            buffer
        };

        debug!(path = ?self.path, "writing database");
        let mut staged = StagedFile::create(&self.path, self.compress)?;
        staged
            .write_all(&snapshot)
            .wrap_err("failed to write staged database file")?;
        staged.commit()?;

        if let Ok(modified) = fs::metadata(&self.path).and_then(|m| m.modified()) {
            *self.mtime.lock() = Some(modified);
        }
        Ok(())
    }

    /// Inserts a song under `directory` (empty for the root), creating
    /// intermediate directories as needed. A song with the same uri is
    /// replaced.
    pub fn add_song(&self, directory: &str, song: Song) -> Result<()> {
        let mut guard = self.tree.lock();
        let tree = match guard.as_mut() {
            Some(tree) => tree,
            None => bail!("database is not open"),
        };
        let id = ensure_directory(tree, directory)?;
        tree.add_song(id, song);
        Ok(())
    }

    /// Registers a playlist in `directory`, creating intermediate
    /// directories as needed.
    pub fn add_playlist(&self, directory: &str, playlist: PlaylistInfo) -> Result<()> {
        let mut guard = self.tree.lock();
        let tree = match guard.as_mut() {
            Some(tree) => tree,
            None => bail!("database is not open"),
        };
        let id = ensure_directory(tree, directory)?;
        let node = tree.node_mut(id);
        node.playlists.retain(|p| p.name != playlist.name);
        node.playlists.push(playlist);
        Ok(())
    }
}

fn ensure_directory(tree: &mut Tree, path: &str) -> Result<DirectoryId> {
    let mut current = Tree::ROOT;
    if path.is_empty() {
        return Ok(current);
    }
    for segment in path.split('/') {
        ensure!(!segment.is_empty(), "empty segment in path {:?}", path);
        ensure!(
            !tree.node(current).is_mount(),
            "cannot modify the subtree of a mount point"
        );
        current = match tree.node(current).children.get(segment) {
            Some(&child) => child,
            None => tree.create_child(current, segment),
        };
    }
    ensure!(
        !tree.node(current).is_mount(),
        "cannot modify the subtree of a mount point"
    );
    Ok(current)
}

impl Database for LibraryDatabase {
    fn open(&self) -> Result<()> {
        LibraryDatabase::open(self)
    }

    fn close(&self) -> Result<()> {
        LibraryDatabase::close(self)
    }

    fn get_song(&self, uri: &str) -> Result<SongBorrow> {
        LibraryDatabase::get_song(self, uri)
    }

    fn return_song(&self, borrow: SongBorrow) {
        LibraryDatabase::return_song(self, borrow)
    }

    fn visit(&self, selection: &Selection<'_>, visitor: &mut dyn Visitor) -> Result<()> {
        LibraryDatabase::visit(self, selection, visitor)
    }

    fn save(&self) -> Result<()> {
        LibraryDatabase::save(self)
    }

    fn update_stamp(&self) -> Option<SystemTime> {
        LibraryDatabase::update_stamp(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_db(path: &Path) -> LibraryDatabase {
        let db = LibraryDatabase::builder()
            .path(path)
            .compress(false)
            .build()
            .unwrap();
        db.open().unwrap();
        db
    }

    #[test]
    fn open_without_file_starts_empty() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir.path().join("db"));
        assert!(db.update_stamp().is_none());
        db.close().unwrap();
    }

    #[test]
    fn open_fails_when_parent_directory_is_missing() {
        let dir = tempdir().unwrap();
        let db = LibraryDatabase::builder()
            .path(dir.path().join("no/such/dir/db"))
            .build()
            .unwrap();
        let err = db.open().unwrap_err();
        assert!(err.to_string().contains("parent"), "got: {err}");
    }

    #[test]
    fn open_fails_on_corrupt_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        std::fs::write(&path, "this is not a database\n").unwrap();

        let db = LibraryDatabase::builder().path(&path).build().unwrap();
        let err = db.open().unwrap_err();
        assert!(err.to_string().contains("failed to load"), "got: {err}");
    }

    #[test]
    fn check_rejects_non_regular_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subdir");
        std::fs::create_dir(&path).unwrap();

        let db = LibraryDatabase::builder().path(&path).build().unwrap();
        let err = db.check().unwrap_err();
        assert!(err.to_string().contains("not a regular file"), "got: {err}");
    }

    #[test]
    fn double_open_fails() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir.path().join("db"));
        assert!(db.open().is_err());
        db.close().unwrap();
    }

    #[test]
    fn close_when_not_open_fails() {
        let dir = tempdir().unwrap();
        let db = LibraryDatabase::builder()
            .path(dir.path().join("db"))
            .build()
            .unwrap();
        assert!(db.close().is_err());
    }

    #[test]
    fn save_records_the_update_stamp() {
        let dir = tempdir().unwrap();
        let db = open_db(&dir.path().join("db"));
        db.add_song("", Song::new("a.mp3")).unwrap();

        assert!(db.update_stamp().is_none());
        db.save().unwrap();
        assert!(db.update_stamp().is_some());
        db.close().unwrap();
    }

    #[test]
    fn save_and_reopen_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        let db = open_db(&path);
        db.add_song("albums/first", Song::new("track.flac")).unwrap();
        db.save().unwrap();
        db.close().unwrap();

        let db = open_db(&path);
        let borrow = db.get_song("albums/first/track.flac").unwrap();
        assert_eq!(borrow.path(), "albums/first/track.flac");
        db.return_song(borrow);
        db.close().unwrap();
    }

    #[test]
    fn save_twice_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        let db = open_db(&path);
        db.add_song("a", Song::new("one.mp3")).unwrap();
        db.add_song("", Song::new("two.mp3")).unwrap();

        db.save().unwrap();
        let first = std::fs::read(&path).unwrap();
        db.save().unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
        db.close().unwrap();
    }

    #[test]
    fn save_prunes_empty_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");

        let db = open_db(&path);
        db.add_song("keep", Song::new("a.mp3")).unwrap();
        db.add_playlist("lists", PlaylistInfo::new("mix.m3u")).unwrap();
        // an empty directory chain, gone after save
        db.add_song("drop/me", Song::new("tmp.mp3")).unwrap();
        {
            let mut guard = db.tree.lock();
            let tree = guard.as_mut().unwrap();
            let hit = tree.lookup("drop/me");
            let id = hit.directory;
            tree.node_mut(id).songs.clear();
        }
        db.save().unwrap();
        db.close().unwrap();

        let db = open_db(&path);
        assert!(db.get_song("keep/a.mp3").map(|b| db.return_song(b)).is_ok());
        let mut saw_drop = false;
        let mut saw_lists = false;
        struct Dirs<'a> {
            saw_drop: &'a mut bool,
            saw_lists: &'a mut bool,
        }
        impl Visitor for Dirs<'_> {
            fn wants_directories(&self) -> bool {
                true
            }
            fn on_directory(&mut self, d: &crate::db::LightDirectory) -> Result<()> {
                if d.uri.starts_with("drop") {
                    *self.saw_drop = true;
                }
                if d.uri == "lists" {
                    *self.saw_lists = true;
                }
                Ok(())
            }
        }
        db.visit(
            &Selection::new("").recursive(true),
            &mut Dirs {
                saw_drop: &mut saw_drop,
                saw_lists: &mut saw_lists,
            },
        )
        .unwrap();
        assert!(!saw_drop, "pruned directory came back");
        assert!(saw_lists, "playlist-only directory was pruned");
        db.close().unwrap();
    }
}
