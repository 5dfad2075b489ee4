//! Index of message identifiers already present in the local mailbox.

use std::collections::HashSet;

use tracing::info;

use crate::error::Result;
use crate::model::remote::RemoteMessage;
use crate::parser::header::normalize_message_id;
use crate::sink::LocalSink;
use crate::transcribe::headers::document_message_id;

/// Message identifiers seen so far, in `<...>` form.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    /// Collect the identifiers already stored in `sink`.
    pub fn load(sink: &dyn LocalSink) -> Result<Self> {
        let seen = sink.message_ids()?;
        info!(
            mailbox = %sink.location().display(),
            ids = seen.len(),
            "Loaded duplicate index"
        );
        Ok(Self { seen })
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.seen.contains(&normalize_message_id(message_id))
    }

    /// Record an identifier. Returns `false` if it was already known.
    pub fn insert(&mut self, message_id: &str) -> bool {
        let key = normalize_message_id(message_id);
        !key.is_empty() && self.seen.insert(key)
    }

    /// Identifiers in sorted order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.seen.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// The identifier used to recognise `msg` in the local mailbox.
///
/// This is the `Message-ID` its transcribed document will carry, so it can be
/// checked before transcription. Items with none cannot be deduplicated.
pub fn message_key(msg: &RemoteMessage) -> Option<String> {
    document_message_id(msg)
}
