//! The song borrow/return protocol.
//!
//! `get_song` resolves under the lock, drops the guard before delegating
//! into a mounted database, and hands out an owned [`SongBorrow`] token.
//! At most one local borrow may be outstanding at a time; the counter
//! enforces that in debug builds. Tokens crossing a mount boundary carry
//! the nested database's own token and forward the return to it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use eyre::Result;

use crate::db::{BorrowOrigin, LibraryDatabase, SongBorrow};
use crate::error::DatabaseError;

impl LibraryDatabase {
    pub fn get_song(&self, uri: &str) -> Result<SongBorrow> {
        let guard = self.tree.lock();
        let tree = match guard.as_ref() {
            Some(tree) => tree,
            None => eyre::bail!("database is not open"),
        };

        let hit = tree.lookup(uri);
        let node = tree.node(hit.directory);

        if let Some(mounted) = &node.mounted {
            // pass the request to the mounted database, without the lock
            let database = Arc::clone(mounted);
            let mount_path = tree.path_of(hit.directory);
            drop(guard);

            let inner = database.get_song(hit.rest.unwrap_or(""))?;
            let song = inner.song().prefixed(&mount_path);
            return Ok(SongBorrow {
                song,
                origin: BorrowOrigin::Mounted {
                    database,
                    inner: Box::new(inner),
                },
            });
        }

        let rest = match hit.rest {
            // the path names a directory, not a song
            None => return Err(DatabaseError::not_found("no such song").into()),
            Some(rest) => rest,
        };
        if rest.contains('/') {
            // refers to a path below a directory that does not exist
            return Err(DatabaseError::not_found("no such song").into());
        }

        let song = match tree.find_song(hit.directory, rest) {
            Some(song) => song,
            None => return Err(DatabaseError::not_found("no such song").into()),
        };

        let directory = tree.path_of(hit.directory);
        let song = song.export(if directory.is_empty() {
            None
        } else {
            Some(&directory)
        });

        let previous = self.borrowed_songs.fetch_add(1, Ordering::AcqRel);
        debug_assert_eq!(previous, 0, "a song borrow is already outstanding");

        Ok(SongBorrow {
            song,
            origin: BorrowOrigin::Local,
        })
    }

    pub fn return_song(&self, borrow: SongBorrow) {
        match borrow.origin {
            BorrowOrigin::Local => {
                let previous = self.borrowed_songs.fetch_sub(1, Ordering::AcqRel);
                debug_assert!(previous > 0, "return_song without an outstanding borrow");
            }
            BorrowOrigin::Mounted { database, inner } => {
                database.return_song(*inner);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn outstanding_borrows(&self) -> u32 {
        self.borrowed_songs.load(Ordering::Acquire)
    }
}
