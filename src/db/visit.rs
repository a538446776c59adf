//! The query/visit engine.
//!
//! `visit` resolves the selection under the lock and dispatches on what the
//! path landed on: a mount point (delegate to the nested database), a
//! directory (filtered walk), or a trailing song name. The local walk runs
//! entirely under the guard; mounted databases discovered along the way are
//! collected and delegated to only after the walk finishes and the guard
//! has been dropped, so this database's lock is never held across a
//! cross-database call.

use std::sync::Arc;

use eyre::{bail, Result, WrapErr};

use crate::db::{Database, LibraryDatabase, LightDirectory, Selection, Visitor};
use crate::error::DatabaseError;
use crate::playlist::PlaylistInfo;
use crate::song::LightSong;
use crate::tree::{DirectoryId, Tree};

/// A mount point encountered while the lock was held; delegation happens
/// after it has been released.
struct MountDelegation {
    /// Full path of the mount point in this database's namespace.
    path: String,
    /// Remainder of the selection uri, relative to the nested database.
    rest: String,
    database: Arc<dyn Database>,
}

impl LibraryDatabase {
    pub fn visit(&self, selection: &Selection<'_>, visitor: &mut dyn Visitor) -> Result<()> {
        let mut deferred: Vec<MountDelegation> = Vec::new();

        {
            let guard = self.tree.lock();
            let tree = match guard.as_ref() {
                Some(tree) => tree,
                None => bail!("database is not open"),
            };

            let hit = tree.lookup(selection.uri);
            let node = tree.node(hit.directory);

            if let Some(mounted) = &node.mounted {
                deferred.push(MountDelegation {
                    path: tree.path_of(hit.directory),
                    rest: hit.rest.unwrap_or("").to_owned(),
                    database: Arc::clone(mounted),
                });
            } else if let Some(rest) = hit.rest {
                if rest.contains('/') || !visitor.wants_songs() {
                    return Err(DatabaseError::not_found("no such directory").into());
                }
                match tree.find_song(hit.directory, rest) {
                    Some(song) => {
                        let directory = tree.path_of(hit.directory);
                        let song = song.export(if directory.is_empty() {
                            None
                        } else {
                            Some(&directory)
                        });
                        if selection.matches(&song) {
                            visitor.on_song(&song)?;
                        }
                    }
                    None => return Err(DatabaseError::not_found("no such directory").into()),
                }
            } else {
                if selection.recursive && visitor.wants_directories() {
                    visitor.on_directory(&export_directory(tree, hit.directory))?;
                }
                walk(tree, hit.directory, selection, visitor, &mut deferred)?;
            }
        }

        for delegation in deferred {
            let nested = Selection {
                uri: &delegation.rest,
                recursive: selection.recursive,
                filter: selection.filter,
            };
            let mut prefixed = PrefixingVisitor {
                prefix: &delegation.path,
                inner: &mut *visitor,
            };
            delegation
                .database
                .visit(&nested, &mut prefixed)
                .wrap_err_with(|| format!("in database mounted at {:?}", delegation.path))?;
        }

        Ok(())
    }
}

/// Depth-first filtered walk below `id`. Emits this directory's songs and
/// playlists, then its children; in recursive mode descends into each
/// child, deferring mount points for delegation after the lock drops.
fn walk(
    tree: &Tree,
    id: DirectoryId,
    selection: &Selection<'_>,
    visitor: &mut dyn Visitor,
    deferred: &mut Vec<MountDelegation>,
) -> Result<()> {
    let node = tree.node(id);
    let directory = tree.path_of(id);

    if visitor.wants_songs() {
        for song in &node.songs {
            let song = song.export(if directory.is_empty() {
                None
            } else {
                Some(&directory)
            });
            if selection.matches(&song) {
                visitor.on_song(&song)?;
            }
        }
    }

    if visitor.wants_playlists() {
        let light = LightDirectory {
            uri: directory.clone(),
            mtime: node.mtime,
        };
        for playlist in &node.playlists {
            visitor.on_playlist(playlist, &light)?;
        }
    }

    let mut names: Vec<&String> = node.children.keys().collect();
    names.sort();
    for name in names {
        let child_id = node.children[name];
        let child = tree.node(child_id);
        if visitor.wants_directories() {
            visitor.on_directory(&export_directory(tree, child_id))?;
        }
        if selection.recursive {
            match &child.mounted {
                Some(mounted) => deferred.push(MountDelegation {
                    path: tree.path_of(child_id),
                    rest: String::new(),
                    database: Arc::clone(mounted),
                }),
                None => walk(tree, child_id, selection, visitor, deferred)?,
            }
        }
    }

    Ok(())
}

fn export_directory(tree: &Tree, id: DirectoryId) -> LightDirectory {
    LightDirectory {
        uri: tree.path_of(id),
        mtime: tree.node(id).mtime,
    }
}

/// Translates events coming out of a mounted database back into this
/// database's namespace by prepending the mount path. The nested root's
/// own directory event is suppressed; the local walk already reported the
/// mount point itself.
struct PrefixingVisitor<'a> {
    prefix: &'a str,
    inner: &'a mut dyn Visitor,
}

impl PrefixingVisitor<'_> {
    fn join(&self, uri: &str) -> String {
        if uri.is_empty() {
            self.prefix.to_owned()
        } else {
            format!("{}/{}", self.prefix, uri)
        }
    }
}

impl Visitor for PrefixingVisitor<'_> {
    fn wants_directories(&self) -> bool {
        self.inner.wants_directories()
    }

    fn wants_songs(&self) -> bool {
        self.inner.wants_songs()
    }

    fn wants_playlists(&self) -> bool {
        self.inner.wants_playlists()
    }

    fn on_directory(&mut self, directory: &LightDirectory) -> Result<()> {
        if directory.is_root() {
            return Ok(());
        }
        self.inner.on_directory(&LightDirectory {
            uri: self.join(&directory.uri),
            mtime: directory.mtime,
        })
    }

    fn on_song(&mut self, song: &LightSong) -> Result<()> {
        self.inner.on_song(&song.prefixed(self.prefix))
    }

    fn on_playlist(&mut self, playlist: &PlaylistInfo, directory: &LightDirectory) -> Result<()> {
        self.inner.on_playlist(
            playlist,
            &LightDirectory {
                uri: self.join(&directory.uri),
                mtime: directory.mtime,
            },
        )
    }
}
