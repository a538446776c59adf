//! Builder for [`LibraryDatabase`].

use std::path::{Path, PathBuf};

use eyre::{bail, Result};

use super::LibraryDatabase;

/// Configures and constructs a [`LibraryDatabase`].
///
/// The backing file path is required; [`DatabaseBuilder::build`] fails
/// without it. The returned database is closed — call
/// [`open`](crate::db::Database::open) on it before use.
///
/// # Example
///
/// ```ignore
/// let db = LibraryDatabase::builder()
///     .path("/var/lib/music/db")
///     .cache_directory("/var/cache/music")
///     .compress(false)
///     .build()?;
/// db.open()?;
/// ```
pub struct DatabaseBuilder {
    path: Option<PathBuf>,
    cache_directory: Option<PathBuf>,
    compress: bool,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            cache_directory: None,
            compress: true,
        }
    }

    /// Location of the backing database file. Required.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Directory under which cache files for identifier-based mounts are
    /// created. Without it, [`mount_remote`] fails.
    ///
    /// [`mount_remote`]: LibraryDatabase::mount_remote
    pub fn cache_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_directory = Some(path.as_ref().to_path_buf());
        self
    }

    /// Whether saves write gzip-compressed output. Defaults to `true`.
    /// Loading detects compression automatically either way.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn build(self) -> Result<LibraryDatabase> {
        let path = match self.path {
            Some(path) => path,
            None => bail!("no database path specified: call .path() first"),
        };
        Ok(LibraryDatabase::new(path, self.cache_directory, self.compress))
    }
}
