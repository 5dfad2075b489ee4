//! Appending to an mboxrd file.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{FerryError, Result};
use crate::parser::header;
use crate::parser::mbox::MboxParser;

use super::lock::lock_exclusive;
use super::LocalSink;

/// An mbox file that messages are appended to.
pub struct MboxSink {
    path: PathBuf,
}

impl MboxSink {
    /// Use `path` as an mbox. The file is created on first append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(FerryError::InvalidMailbox(path));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(FerryError::MailboxNotFound(parent.to_path_buf()));
            }
        }
        Ok(Self { path })
    }
}

impl LocalSink for MboxSink {
    fn append(&mut self, message: &[u8]) -> Result<u64> {
        let entry = mbox_entry(message, Utc::now());

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FerryError::io(&self.path, e))?;
        let mut locked = lock_exclusive(file, &self.path)?;
        locked
            .write_all(&entry)
            .and_then(|()| locked.flush())
            .map_err(|e| FerryError::io(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = entry.len(), "Appended message to mbox");
        Ok(entry.len() as u64)
    }

    fn message_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        if !self.path.exists() {
            return Ok(ids);
        }

        let parser = MboxParser::new(&self.path)?;
        let count = parser.parse_headers_only(&mut |_offset, headers| {
            if let Some(id) = header::message_id_from_header_block(headers) {
                ids.insert(id);
            }
            true
        })?;

        info!(
            path = %self.path.display(),
            messages = count,
            ids = ids.len(),
            "Collected message ids from mbox"
        );
        Ok(ids)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// Frame one message for an mbox: separator line, LF line endings, `From `
/// lines (and already-quoted `>From ` lines) quoted with one more `>`, and a
/// trailing blank line.
pub fn mbox_entry(message: &[u8], received: DateTime<Utc>) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 128);
    out.extend_from_slice(
        format!(
            "From MAILER-DAEMON {}\n",
            received.format("%a %b %e %H:%M:%S %Y")
        )
        .as_bytes(),
    );

    let trimmed = message
        .strip_suffix(b"\r\n")
        .or_else(|| message.strip_suffix(b"\n"))
        .unwrap_or(message);
    for line in trimmed.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if needs_quoting(line) {
            out.push(b'>');
        }
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.push(b'\n');
    out
}

fn needs_quoting(line: &[u8]) -> bool {
    let unquoted = &line[line.iter().take_while(|&&b| b == b'>').count()..];
    unquoted.starts_with(b"From ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 4, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_entry_framing() {
        let entry = mbox_entry(b"Subject: x\r\n\r\nbody\r\n", at());
        assert_eq!(
            String::from_utf8(entry).unwrap(),
            "From MAILER-DAEMON Thu Jan  4 09:05:00 2024\nSubject: x\n\nbody\n\n"
        );
    }

    #[test]
    fn test_from_lines_are_quoted() {
        let entry = mbox_entry(b"Subject: x\n\nFrom here\n>From there\nFromage\n", at());
        let text = String::from_utf8(entry).unwrap();
        assert!(text.contains("\n>From here\n"));
        assert!(text.contains("\n>>From there\n"));
        assert!(text.contains("\nFromage\n"));
    }

    #[test]
    fn test_append_and_collect_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = MboxSink::open(tmp.path().join("inbox")).unwrap();
        assert!(sink.message_ids().unwrap().is_empty());

        sink.append(b"Message-ID: <a@example.com>\r\nSubject: one\r\n\r\nFrom me\r\n")
            .unwrap();
        sink.append(b"Message-ID: <b@example.com>\r\nSubject: two\r\n\r\nhi\r\n")
            .unwrap();
        sink.append(b"Subject: no id\r\n\r\nhi\r\n").unwrap();

        let ids = sink.message_ids().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("<a@example.com>"));
        assert!(ids.contains("<b@example.com>"));
    }

    #[test]
    fn test_open_directory_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            MboxSink::open(tmp.path()),
            Err(FerryError::InvalidMailbox(_))
        ));
    }

    #[test]
    fn test_open_missing_parent() {
        assert!(matches!(
            MboxSink::open("/nonexistent/mailferry/inbox"),
            Err(FerryError::MailboxNotFound(_))
        ));
    }
}
