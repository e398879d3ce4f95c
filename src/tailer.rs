use anyhow::Result;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{MonitorError, TailError};

/// A source of log lines that may not have any new line available yet.
pub trait LineSource {
    /// Return the next complete line without its terminator, or `None` if
    /// nothing new has been written since the last call.
    fn next_line(&mut self) -> Result<Option<String>>;
}

/// Follows a growing log file from its end, like `tail -f`.
///
/// Lines written before [`LogTailer::open`] are never returned. A line is
/// only returned once its newline has been written; partial writes are held
/// until then. Truncation and rotation are not detected.
pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    pending: Vec<u8>,
}

impl LogTailer {
    /// Open `path` and position the reader at its current end.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::OpenFailed`] if the file does not exist or cannot
    /// be read or seeked.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_failed = |e: std::io::Error| {
            MonitorError::from(TailError::OpenFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        };

        let file = File::open(&path).map_err(open_failed)?;
        let mut reader = BufReader::new(file);
        let offset = reader.seek(SeekFrom::End(0)).map_err(open_failed)?;
        debug!("Tailing {} from byte offset {}", path.display(), offset);

        Ok(Self {
            path,
            reader,
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSource for LogTailer {
    fn next_line(&mut self) -> Result<Option<String>> {
        self.reader
            .read_until(b'\n', &mut self.pending)
            .map_err(|e| {
                MonitorError::from(TailError::ReadFailed {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })
            })?;

        if self.pending.last() != Some(&b'\n') {
            return Ok(None);
        }

        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        Ok(Some(line))
    }
}
