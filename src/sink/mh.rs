//! Appending to an MH folder: one numbered file per message.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{FerryError, Result};
use crate::parser::header;

use super::lock::lock_exclusive;
use super::LocalSink;

/// Held while picking the next message number and writing the message.
const SEQUENCES_FILE: &str = ".mh_sequences";

/// An MH folder.
pub struct MhSink {
    dir: PathBuf,
}

impl MhSink {
    /// Use `dir` as an MH folder, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() && !dir.is_dir() {
            return Err(FerryError::InvalidMailbox(dir));
        }
        std::fs::create_dir_all(&dir).map_err(|e| FerryError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Message numbers present in the folder, ascending.
    fn message_numbers(&self) -> Result<Vec<u64>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| FerryError::io(&self.dir, e))?;
        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FerryError::io(&self.dir, e))?;
            if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }
}

impl LocalSink for MhSink {
    fn append(&mut self, message: &[u8]) -> Result<u64> {
        let seq_path = self.dir.join(SEQUENCES_FILE);
        let seq_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&seq_path)
            .map_err(|e| FerryError::io(&seq_path, e))?;
        let _guard = lock_exclusive(seq_file, &seq_path)?;

        let next = self.message_numbers()?.last().map_or(1, |n| n + 1);
        let path = self.dir.join(next.to_string());
        let data = to_lf(message);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| FerryError::io(&path, e))?;
        file.write_all(&data)
            .and_then(|()| file.flush())
            .map_err(|e| FerryError::io(&path, e))?;

        debug!(path = %path.display(), bytes = data.len(), "Added message to MH folder");
        Ok(data.len() as u64)
    }

    fn message_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        let numbers = self.message_numbers()?;
        for n in &numbers {
            let path = self.dir.join(n.to_string());
            match read_header_block(&path) {
                Ok(block) => {
                    if let Some(id) = header::message_id_from_header_block(&block) {
                        ids.insert(id);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable message"),
            }
        }
        info!(
            path = %self.dir.display(),
            messages = numbers.len(),
            ids = ids.len(),
            "Collected message ids from MH folder"
        );
        Ok(ids)
    }

    fn location(&self) -> &Path {
        &self.dir
    }
}

/// Read lines up to (not including) the first blank line.
fn read_header_block(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| FerryError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut block = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| FerryError::io(path, e))?;
        if n == 0 || line == b"\n" || line == b"\r\n" {
            break;
        }
        block.extend_from_slice(&line);
    }
    Ok(block)
}

/// Normalize CRLF to LF.
fn to_lf(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len());
    let mut iter = message.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}
