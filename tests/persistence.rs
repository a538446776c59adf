//! # Persistence Tests
//!
//! End-to-end coverage of the save/load cycle:
//! 1. A saved database reloads into an equal tree across instances
//! 2. Saving twice without mutation produces byte-identical files
//! 3. Compression is applied on save and detected on load
//! 4. Mount attachment never round-trips; the mount point reappears as a
//!    plain directory
//! 5. Open falls back to an empty tree only when the file is missing, not
//!    when its content is corrupt

use std::sync::Arc;

use tunedb::{LibraryDatabase, PlaylistInfo, Selection, Song, TagType, Visitor};

fn build_db(path: &std::path::Path, compress: bool) -> LibraryDatabase {
    LibraryDatabase::builder()
        .path(path)
        .compress(compress)
        .build()
        .unwrap()
}

fn populate(db: &LibraryDatabase) {
    let mut song = Song::new("track.flac");
    song.tag.add(TagType::Artist, "Someone");
    song.tag.add(TagType::Album, "First");
    song.tag.duration = Some(std::time::Duration::from_secs(215));
    db.add_song("albums/first", song).unwrap();

    db.add_song("", Song::new("loose.mp3")).unwrap();
    db.add_playlist("albums", PlaylistInfo::new("best.m3u")).unwrap();
}

#[derive(Default)]
struct Collector {
    directories: Vec<String>,
    songs: Vec<String>,
    playlists: Vec<String>,
}

impl Visitor for Collector {
    fn wants_directories(&self) -> bool {
        true
    }
    fn wants_playlists(&self) -> bool {
        true
    }
    fn on_directory(&mut self, d: &tunedb::LightDirectory) -> eyre::Result<()> {
        self.directories.push(d.uri.clone());
        Ok(())
    }
    fn on_song(&mut self, s: &tunedb::LightSong) -> eyre::Result<()> {
        self.songs.push(s.path());
        Ok(())
    }
    fn on_playlist(&mut self, p: &PlaylistInfo, d: &tunedb::LightDirectory) -> eyre::Result<()> {
        self.playlists.push(format!("{}::{}", d.uri, p.name));
        Ok(())
    }
}

fn collect(db: &LibraryDatabase) -> Collector {
    let mut collector = Collector::default();
    db.visit(&Selection::new("").recursive(true), &mut collector)
        .unwrap();
    collector
}

#[test]
fn saved_database_reloads_into_an_equal_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let db = build_db(&path, false);
    db.open().unwrap();
    populate(&db);
    db.save().unwrap();
    let before = collect(&db);
    db.close().unwrap();

    let db = build_db(&path, false);
    db.open().unwrap();
    let after = collect(&db);
    assert_eq!(before.directories, after.directories);
    assert_eq!(before.songs, after.songs);
    assert_eq!(before.playlists, after.playlists);

    // tag payloads survive too
    let song = db.get_song("albums/first/track.flac").unwrap();
    assert_eq!(song.tag.value(TagType::Artist), Some("Someone"));
    assert_eq!(song.tag.duration, Some(std::time::Duration::from_secs(215)));
    db.return_song(song);
    db.close().unwrap();
}

#[test]
fn save_is_idempotent_plain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let db = build_db(&path, false);
    db.open().unwrap();
    populate(&db);

    db.save().unwrap();
    let first = std::fs::read(&path).unwrap();
    db.save().unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);
    db.close().unwrap();
}

#[test]
fn save_is_idempotent_compressed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let db = build_db(&path, true);
    db.open().unwrap();
    populate(&db);

    db.save().unwrap();
    let first = std::fs::read(&path).unwrap();
    db.save().unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);
    db.close().unwrap();
}

#[test]
fn compressed_save_is_gzip_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let db = build_db(&path, true);
    db.open().unwrap();
    populate(&db);
    db.save().unwrap();
    db.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b], "saved file SHOULD be gzip");

    // a database built without compression still reads it
    let db = build_db(&path, false);
    db.open().unwrap();
    let song = db.get_song("loose.mp3").unwrap();
    assert_eq!(song.path(), "loose.mp3");
    db.return_song(song);
    db.close().unwrap();
}

#[test]
fn mount_attachment_does_not_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let db = build_db(&path, false);
    db.open().unwrap();

    let nested = build_db(&dir.path().join("nested"), false);
    nested.open().unwrap();
    nested.add_song("", Song::new("inside.mp3")).unwrap();
    db.mount("radio", Arc::new(nested)).unwrap();

    db.save().unwrap();
    assert!(db.unmount("radio"));
    db.close().unwrap();

    let db = build_db(&path, false);
    db.open().unwrap();
    // the mount point came back as a plain, empty directory (the first
    // entry is the queried root itself)
    let collected = collect(&db);
    assert_eq!(collected.directories, vec!["", "radio"]);
    assert!(collected.songs.is_empty());
    assert!(db.lock_umount_steal("radio").is_none());
    db.close().unwrap();
}

#[test]
fn open_with_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let db = build_db(&dir.path().join("db"), false);
    db.open().unwrap();

    assert!(db.update_stamp().is_none());
    let collected = collect(&db);
    assert!(collected.songs.is_empty());
    db.close().unwrap();
}

#[test]
fn open_with_corrupt_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");
    std::fs::write(&path, "info_begin\nformat: 1\ninfo_end\ngarbage\n").unwrap();

    let db = build_db(&path, false);
    let err = db.open().unwrap_err();
    assert!(err.to_string().contains("failed to load"), "got: {err}");
}

#[test]
fn open_without_parent_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = build_db(&dir.path().join("missing/db"), false);
    assert!(db.open().is_err());
}

#[test]
fn update_stamp_tracks_successful_saves_and_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let db = build_db(&path, false);
    db.open().unwrap();
    assert!(db.update_stamp().is_none());
    db.add_song("", Song::new("a.mp3")).unwrap();
    db.save().unwrap();
    assert!(db.update_stamp().is_some());
    db.close().unwrap();

    let db = build_db(&path, false);
    db.open().unwrap();
    assert!(db.update_stamp().is_some(), "load SHOULD record the stamp");
    db.close().unwrap();
}

#[test]
fn failed_save_leaves_the_previous_file_intact() {
    let base = tempfile::tempdir().unwrap();
    let data = base.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let path = data.join("db");

    let db = build_db(&path, false);
    db.open().unwrap();
    db.add_song("", Song::new("a.mp3")).unwrap();
    db.save().unwrap();
    let before = std::fs::read(&path).unwrap();

    db.add_song("", Song::new("b.mp3")).unwrap();

    // make the destination directory unreachable; staging cannot even be
    // created, so the previous file must survive untouched
    let moved = base.path().join("moved");
    std::fs::rename(&data, &moved).unwrap();
    assert!(db.save().is_err());
    std::fs::rename(&moved, &data).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), before);
    db.close().unwrap();
}
