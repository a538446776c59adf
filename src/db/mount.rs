//! Attaching and detaching nested databases at tree paths.

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tracing::{info, warn};

use crate::db::{Database, LibraryDatabase};
use crate::error::DatabaseError;

/// Characters allowed verbatim in a cache file name derived from a remote
/// identifier; everything else becomes `_`.
fn is_safe_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '%')
}

pub(crate) fn sanitize_cache_name(identifier: &str) -> String {
    identifier
        .chars()
        .map(|ch| if is_safe_char(ch) { ch } else { '_' })
        .collect()
}

impl LibraryDatabase {
    /// Attaches `database` at `uri`, creating the mount-point directory.
    ///
    /// Fails with a CONFLICT error when `uri` already exists and with
    /// NOT_FOUND when its parent directory does not.
    pub fn mount(&self, uri: &str, database: Arc<dyn Database>) -> Result<()> {
        let mut guard = self.tree.lock();
        let tree = match guard.as_mut() {
            Some(tree) => tree,
            None => eyre::bail!("database is not open"),
        };

        let hit = tree.lookup(uri);
        if tree.node(hit.directory).is_mount() {
            // resolution stopped at an existing mount point; nothing may
            // be created beneath it
            return Err(DatabaseError::conflict("mount point in the way").into());
        }
        let rest = match hit.rest {
            None => return Err(DatabaseError::conflict("already exists").into()),
            Some(rest) => rest,
        };
        if rest.contains('/') {
            return Err(DatabaseError::not_found("parent directory not found").into());
        }

        let id = tree.create_child(hit.directory, rest);
        tree.node_mut(id).mounted = Some(database);
        drop(guard);

        info!(uri, "mounted database");
        Ok(())
    }

    /// Mounts a cache-backed database for a remote identifier.
    ///
    /// The cache file name is derived from `identifier` by replacing every
    /// character outside `[A-Za-z0-9_%-]` with `_`; the nested database
    /// lives at `<cache_directory>/<sanitized>` and inherits this
    /// database's compression setting. On any failure the freshly created
    /// instance is closed and dropped before the error propagates.
    pub fn mount_remote(&self, uri: &str, identifier: &str) -> Result<()> {
        let cache_directory = match self.cache_directory() {
            Some(dir) => dir,
            None => {
                return Err(DatabaseError::not_found("no cache directory configured").into())
            }
        };

        let name = sanitize_cache_name(identifier);
        let database = LibraryDatabase::builder()
            .path(cache_directory.join(name))
            .compress(self.compress_enabled())
            .build()?;
        database
            .open()
            .wrap_err_with(|| format!("failed to open cache database for {:?}", identifier))?;

        let database: Arc<dyn Database> = Arc::new(database);
        if let Err(err) = self.mount(uri, Arc::clone(&database)) {
            if let Err(close_err) = database.close() {
                warn!("failed to close cache database: {close_err:#}");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Detaches the mount point at `uri` and hands its database back to
    /// the caller, who becomes responsible for closing it.
    ///
    /// Returns `None` — not an error — when `uri` does not land exactly on
    /// a mount point.
    pub fn lock_umount_steal(&self, uri: &str) -> Option<Arc<dyn Database>> {
        let mut guard = self.tree.lock();
        let tree = guard.as_mut()?;

        let hit = tree.lookup(uri);
        if hit.rest.is_some() {
            return None;
        }
        let database = tree.node_mut(hit.directory).mounted.take()?;
        tree.remove(hit.directory);
        Some(database)
    }

    /// Unmounts and closes the database at `uri`. Returns whether a mount
    /// point was actually there.
    pub fn unmount(&self, uri: &str) -> bool {
        match self.lock_umount_steal(uri) {
            Some(database) => {
                if let Err(err) = database.close() {
                    warn!("failed to close unmounted database: {err:#}");
                }
                info!(uri, "unmounted database");
                true
            }
            None => false,
        }
    }
}
