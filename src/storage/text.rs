//! Line-oriented reader with transparent gzip detection.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use eyre::{Result, WrapErr};
use flate2::read::GzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A text file read line by line.
///
/// Compressed files are detected by their magic bytes and decompressed on
/// the fly. The current line number is tracked so parse errors can point
/// at the offending line.
pub(crate) struct TextFile {
    reader: Box<dyn BufRead>,
    line: u64,
}

impl TextFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open database file {:?}", path))?;
        let mut reader = BufReader::new(file);

        let head = reader
            .fill_buf()
            .wrap_err_with(|| format!("failed to read database file {:?}", path))?;
        let reader: Box<dyn BufRead> = if head.starts_with(&GZIP_MAGIC) {
            Box::new(BufReader::new(GzDecoder::new(reader)))
        } else {
            Box::new(reader)
        };

        Ok(Self { reader, line: 0 })
    }

    /// Next line without its terminator, or `None` at end of file.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        let n = self
            .reader
            .read_line(&mut buf)
            .wrap_err_with(|| format!("read error at line {}", self.line + 1))?;
        if n == 0 {
            return Ok(None);
        }
        self.line += 1;
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    /// Number of the most recently read line, 1-based.
    pub fn line_number(&self) -> u64 {
        self.line
    }
}
