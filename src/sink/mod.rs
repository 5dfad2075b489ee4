//! Local sinks: append-only mailboxes that receive finished messages.

pub mod lock;
pub mod mbox;
pub mod mh;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use mbox::MboxSink;
pub use mh::MhSink;

/// A local mailbox.
///
/// Every append takes an exclusive lock for its own duration only. The sink
/// does not look for duplicates; that is the caller's job.
pub trait LocalSink {
    /// Append one rendered message. Returns the number of bytes stored.
    fn append(&mut self, message: &[u8]) -> Result<u64>;

    /// `Message-ID`s (in `<...>` form) of the messages already stored.
    fn message_ids(&self) -> Result<HashSet<String>>;

    fn location(&self) -> &Path;
}

/// On-disk mailbox flavour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MailboxFormat {
    /// An existing directory is MH, anything else is mbox.
    #[default]
    Auto,
    Mbox,
    Mh,
}

impl MailboxFormat {
    /// Settle `Auto` by looking at what is on disk.
    pub fn resolve(self, path: &Path) -> MailboxFormat {
        match self {
            MailboxFormat::Auto if path.is_dir() => MailboxFormat::Mh,
            MailboxFormat::Auto => MailboxFormat::Mbox,
            other => other,
        }
    }
}

/// Open the mailbox at `path` in the given format.
pub fn open_sink(path: &Path, format: MailboxFormat) -> Result<Box<dyn LocalSink>> {
    Ok(match format.resolve(path) {
        MailboxFormat::Mh => Box::new(MhSink::open(path)?),
        _ => Box::new(MboxSink::open(path)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_auto() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(MailboxFormat::Auto.resolve(tmp.path()), MailboxFormat::Mh);
        assert_eq!(
            MailboxFormat::Auto.resolve(&tmp.path().join("inbox.mbox")),
            MailboxFormat::Mbox
        );
        assert_eq!(MailboxFormat::Mh.resolve(&tmp.path().join("x")), MailboxFormat::Mh);
    }

    #[test]
    fn test_open_sink_creates_mh_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Mail");
        let sink = open_sink(&dir, MailboxFormat::Mh).unwrap();
        assert!(dir.is_dir());
        assert_eq!(sink.location(), dir.as_path());
    }
}
