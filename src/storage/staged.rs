//! Two-phase database file replacement.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::{eyre, Result, WrapErr};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

enum Layer {
    Plain(BufWriter<NamedTempFile>),
    Gzip(BufWriter<GzEncoder<NamedTempFile>>),
}

/// A staged database file.
///
/// Bytes are written to a temporary file in the destination's directory,
/// through a buffer and an optional gzip encoder. [`StagedFile::commit`]
/// flushes each layer in order, fsyncs, and atomically renames the
/// temporary file over the destination; dropping without committing
/// removes the temporary file and leaves the destination untouched.
pub(crate) struct StagedFile {
    dest: PathBuf,
    layer: Layer,
}

impl StagedFile {
    pub fn create(dest: &Path, compress: bool) -> Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)
            .wrap_err_with(|| format!("failed to create staging file in {:?}", dir))?;
        let layer = if compress {
            Layer::Gzip(BufWriter::new(GzEncoder::new(tmp, Compression::default())))
        } else {
            Layer::Plain(BufWriter::new(tmp))
        };
        Ok(Self {
            dest: dest.to_path_buf(),
            layer,
        })
    }

    pub fn commit(self) -> Result<()> {
        let tmp = match self.layer {
            Layer::Plain(buf) => buf
                .into_inner()
                .map_err(io::IntoInnerError::into_error)
                .wrap_err("failed to flush staged database file")?,
            Layer::Gzip(buf) => buf
                .into_inner()
                .map_err(io::IntoInnerError::into_error)
                .wrap_err("failed to flush staged database file")?
                .finish()
                .wrap_err("failed to finish compressed stream")?,
        };
        tmp.as_file()
            .sync_all()
            .wrap_err("failed to sync staged database file")?;
        tmp.persist(&self.dest)
            .map_err(|e| eyre!(e.error))
            .wrap_err_with(|| format!("failed to replace database file {:?}", self.dest))?;
        Ok(())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.layer {
            Layer::Plain(w) => w.write(buf),
            Layer::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.layer {
            Layer::Plain(w) => w.flush(),
            Layer::Gzip(w) => w.flush(),
        }
    }
}
