//! Streaming MBOX header scanner.
//!
//! Reads MBOX files line-by-line through a large buffer and hands the header
//! block of every message to a callback. Bodies are skipped. Tolerant of
//! mixed line endings, a UTF-8 BOM and `From ` lines without a preceding
//! blank line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{FerryError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Header blocks larger than this are truncated before being handed out.
const MAX_HEADER_SIZE: usize = 1024 * 1024;

/// Streaming scanner over an MBOX file.
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FerryError::MailboxNotFound(path.clone())
            } else {
                FerryError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            file_size: metadata.len(),
        })
    }

    /// Scan the file, calling `header_callback(offset, header_bytes)` once per message.
    ///
    /// `header_bytes` starts with the `From ` separator line and stops before
    /// the blank line that ends the header block. The callback returns `true`
    /// to continue or `false` to stop early.
    ///
    /// Returns the number of messages seen.
    pub fn parse_headers_only(
        &self,
        header_callback: &mut dyn FnMut(u64, &[u8]) -> bool,
    ) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| FerryError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut current_offset: u64 = 0;
        let mut header_buf: Vec<u8> = Vec::with_capacity(16 * 1024);
        let mut in_headers = false;
        let mut prev_line_was_empty = true;
        let mut first_line = true;
        let mut message_start: Option<u64> = None;

        // Reusable line buffer
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| FerryError::io(&self.path, e))?;
            if line_len == 0 {
                break; // EOF
            }

            let is_from_line = is_mbox_separator(&line_buf);

            if is_from_line && (first_line || prev_line_was_empty || !in_headers) {
                if !first_line && !prev_line_was_empty {
                    warn!(
                        offset = current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }

                if let Some(start) = message_start.take() {
                    if !header_callback(start, &header_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }

                header_buf.clear();
                header_buf.extend_from_slice(&line_buf);
                in_headers = true;
                message_start = Some(current_offset);
            } else if in_headers {
                if is_blank_line(&line_buf) {
                    in_headers = false;
                } else if header_buf.len() + line_buf.len() <= MAX_HEADER_SIZE {
                    header_buf.extend_from_slice(&line_buf);
                }
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            current_offset += line_len as u64;
        }

        // Flush last message
        if let Some(start) = message_start {
            if header_callback(start, &header_buf) {
                count += 1;
            }
        }

        Ok(count)
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
