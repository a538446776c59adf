//! Serializer and parser for the database file format.
//!
//! The format is described in the [module docs](crate::storage). The
//! serializer emits children in name order so that repeated saves of an
//! unchanged tree are byte-identical; the parser validates the header
//! before touching the tree and reports the line number of anything it
//! does not understand.

use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eyre::{bail, Result};

use crate::playlist::PlaylistInfo;
use crate::song::Song;
use crate::storage::TextFile;
use crate::tag::TagType;
use crate::tree::{DirectoryId, Tree};

/// Current file format revision. Files with a newer revision are refused.
const FORMAT: u32 = 1;

pub(crate) fn save(out: &mut dyn Write, tree: &Tree) -> Result<()> {
    writeln!(out, "info_begin")?;
    writeln!(out, "format: {}", FORMAT)?;
    writeln!(out, "version: {}", env!("CARGO_PKG_VERSION"))?;
    for tag_type in TagType::ALL {
        writeln!(out, "tag: {}", tag_type)?;
    }
    writeln!(out, "info_end")?;
    save_contents(out, tree, Tree::ROOT)
}

fn save_contents(out: &mut dyn Write, tree: &Tree, id: DirectoryId) -> Result<()> {
    let node = tree.node(id);

    let mut names: Vec<&String> = node.children.keys().collect();
    names.sort();
    for name in names {
        let child_id = node.children[name];
        let child = tree.node(child_id);
        writeln!(out, "directory_begin: {}", name)?;
        if let Some(secs) = unix_seconds(child.mtime) {
            writeln!(out, "mtime: {}", secs)?;
        }
        // a mount point's contents belong to the nested database and are
        // never persisted here
        if !child.is_mount() {
            save_contents(out, tree, child_id)?;
        }
        writeln!(out, "directory_end: {}", name)?;
    }

    for song in &node.songs {
        writeln!(out, "song_begin: {}", song.uri)?;
        for (tag_type, value) in song.tag.iter() {
            writeln!(out, "{}: {}", tag_type, value)?;
        }
        if let Some(duration) = song.tag.duration {
            writeln!(out, "Time: {}", duration.as_secs())?;
        }
        if let Some(secs) = unix_seconds(song.mtime) {
            writeln!(out, "mtime: {}", secs)?;
        }
        writeln!(out, "song_end")?;
    }

    for playlist in &node.playlists {
        writeln!(out, "playlist_begin: {}", playlist.name)?;
        if let Some(secs) = unix_seconds(playlist.mtime) {
            writeln!(out, "mtime: {}", secs)?;
        }
        writeln!(out, "playlist_end")?;
    }

    Ok(())
}

fn unix_seconds(mtime: Option<SystemTime>) -> Option<u64> {
    mtime
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

pub(crate) fn load(file: &mut TextFile, tree: &mut Tree) -> Result<()> {
    load_header(file)?;
    load_directory(file, tree, Tree::ROOT, None)
}

fn load_header(file: &mut TextFile) -> Result<()> {
    match file.read_line()?.as_deref() {
        Some("info_begin") => {}
        _ => bail!("unrecognized database header"),
    }
    loop {
        let line = match file.read_line()? {
            Some(line) => line,
            None => bail!("unexpected end of file inside the header"),
        };
        if line == "info_end" {
            return Ok(());
        }
        let (key, value) = match line.split_once(": ") {
            Some(pair) => pair,
            None => bail!("line {}: malformed header line", file.line_number()),
        };
        match key {
            "format" => {
                let format: u32 = value
                    .parse()
                    .map_err(|_| eyre::eyre!("line {}: malformed format", file.line_number()))?;
                if format > FORMAT {
                    bail!("unsupported database format {}", format);
                }
            }
            "version" => {}
            "tag" => {
                if TagType::parse(value).is_none() {
                    bail!("line {}: unsupported tag {:?}", file.line_number(), value);
                }
            }
            _ => bail!("line {}: unknown header line {:?}", file.line_number(), line),
        }
    }
}

/// Parses the contents of one directory block. `expected_end` is the name
/// the closing `directory_end` line must carry, or `None` for the root,
/// which ends at end of file.
fn load_directory(
    file: &mut TextFile,
    tree: &mut Tree,
    id: DirectoryId,
    expected_end: Option<&str>,
) -> Result<()> {
    loop {
        let line = match file.read_line()? {
            Some(line) => line,
            None => {
                if expected_end.is_some() {
                    bail!("unexpected end of file inside a directory block");
                }
                return Ok(());
            }
        };

        if let Some(name) = line.strip_prefix("directory_begin: ") {
            validate_name(file, name)?;
            if tree.node(id).children.contains_key(name) {
                bail!("line {}: duplicate directory {:?}", file.line_number(), name);
            }
            let name = name.to_owned();
            let child = tree.create_child(id, &name);
            load_directory(file, tree, child, Some(&name))?;
        } else if let Some(name) = line.strip_prefix("directory_end: ") {
            match expected_end {
                Some(expected) if expected == name => return Ok(()),
                _ => bail!(
                    "line {}: mismatched directory_end {:?}",
                    file.line_number(),
                    name
                ),
            }
        } else if let Some(uri) = line.strip_prefix("song_begin: ") {
            validate_name(file, uri)?;
            let song = load_song(file, uri)?;
            tree.add_song(id, song);
        } else if let Some(name) = line.strip_prefix("playlist_begin: ") {
            validate_name(file, name)?;
            let playlist = load_playlist(file, name)?;
            tree.node_mut(id).playlists.push(playlist);
        } else if let Some(value) = line.strip_prefix("mtime: ") {
            tree.node_mut(id).mtime = Some(parse_mtime(file, value)?);
        } else {
            bail!("line {}: unknown line {:?}", file.line_number(), line);
        }
    }
}

fn load_song(file: &mut TextFile, uri: &str) -> Result<Song> {
    let mut song = Song::new(uri);
    loop {
        let line = match file.read_line()? {
            Some(line) => line,
            None => bail!("unexpected end of file inside a song block"),
        };
        if line == "song_end" {
            return Ok(song);
        }
        let (key, value) = match line.split_once(": ") {
            Some(pair) => pair,
            None => bail!("line {}: malformed song line", file.line_number()),
        };
        if key == "Time" {
            let secs: u64 = value
                .parse()
                .map_err(|_| eyre::eyre!("line {}: malformed Time", file.line_number()))?;
            song.tag.duration = Some(Duration::from_secs(secs));
        } else if key == "mtime" {
            song.mtime = Some(parse_mtime(file, value)?);
        } else if let Some(tag_type) = TagType::parse(key) {
            song.tag.add(tag_type, value);
        } else {
            bail!("line {}: unknown song line {:?}", file.line_number(), line);
        }
    }
}

fn load_playlist(file: &mut TextFile, name: &str) -> Result<PlaylistInfo> {
    let mut playlist = PlaylistInfo::new(name);
    loop {
        let line = match file.read_line()? {
            Some(line) => line,
            None => bail!("unexpected end of file inside a playlist block"),
        };
        if line == "playlist_end" {
            return Ok(playlist);
        }
        if let Some(value) = line.strip_prefix("mtime: ") {
            playlist.mtime = Some(parse_mtime(file, value)?);
        } else {
            bail!(
                "line {}: unknown playlist line {:?}",
                file.line_number(),
                line
            );
        }
    }
}

fn validate_name(file: &TextFile, name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("line {}: empty name", file.line_number());
    }
    if name.contains('/') {
        bail!("line {}: name {:?} contains a slash", file.line_number(), name);
    }
    Ok(())
}

fn parse_mtime(file: &TextFile, value: &str) -> Result<SystemTime> {
    let secs: u64 = value
        .parse()
        .map_err(|_| eyre::eyre!("line {}: malformed mtime", file.line_number()))?;
    Ok(UNIX_EPOCH + Duration::from_secs(secs))
}
