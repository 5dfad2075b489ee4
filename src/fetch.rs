//! The fetch run: list, transcribe, deduplicate, append, mark read.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dedup::{self, DedupIndex};
use crate::error::{FerryError, Result};
use crate::model::remote::RemoteMessage;
use crate::render;
use crate::sink::LocalSink;
use crate::source::{ListQuery, RemoteSource};
use crate::transcribe::{self, Transcribed};

/// What to do when a single item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Stop the run and report the error.
    #[default]
    Abort,
    /// Log the error, count it, and go on with the next item.
    Continue,
}

/// Knobs for one fetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub unread_only: bool,
    pub limit: Option<usize>,
    pub mark_read: bool,
    /// Transcribe only. Nothing is appended and nothing is marked read.
    pub pretend: bool,
    pub check_dupes: bool,
    pub on_error: OnError,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            unread_only: true,
            limit: None,
            mark_read: true,
            pretend: false,
            check_dupes: false,
            on_error: OnError::Abort,
        }
    }
}

/// Progress notifications, emitted in item order.
#[derive(Debug)]
pub enum FetchEvent<'a> {
    /// About to process item `index` (1-based) of `total`.
    Fetching {
        index: usize,
        total: usize,
        item: &'a RemoteMessage,
    },
    /// The item's identifier is already in the local mailbox.
    Duplicate {
        item: &'a RemoteMessage,
        message_id: &'a str,
    },
    /// The item has no headers.
    Skipped { item: &'a RemoteMessage },
    /// The item failed and the run goes on.
    Failed {
        item: &'a RemoteMessage,
        error: &'a FerryError,
    },
    /// The item was written to the mailbox.
    Appended { item: &'a RemoteMessage, bytes: u64 },
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub listed: usize,
    pub transcribed: usize,
    pub appended: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    pub marked_read: usize,
    pub bytes_written: u64,
    /// Embedded item attachments left out of the transcribed messages.
    pub attachments_skipped: usize,
}

/// Run one fetch pass from `source` into `sink`.
pub fn run(
    source: &mut dyn RemoteSource,
    sink: &mut dyn LocalSink,
    options: &FetchOptions,
    on_event: &mut dyn FnMut(FetchEvent<'_>),
) -> Result<FetchStats> {
    let query = ListQuery {
        unread_only: options.unread_only,
        limit: options.limit,
    };
    let items = source.list_messages(&query)?;
    let mut index = if options.check_dupes {
        Some(DedupIndex::load(sink)?)
    } else {
        None
    };

    let mut stats = FetchStats {
        listed: items.len(),
        ..FetchStats::default()
    };
    info!(
        items = items.len(),
        mailbox = %sink.location().display(),
        pretend = options.pretend,
        "Starting fetch"
    );

    let total = items.len();
    for (i, item) in items.iter().enumerate() {
        on_event(FetchEvent::Fetching {
            index: i + 1,
            total,
            item,
        });

        let outcome = fetch_one(
            item,
            source,
            sink,
            options,
            index.as_mut(),
            &mut stats,
            on_event,
        );
        if let Err(error) = outcome {
            match options.on_error {
                OnError::Abort => return Err(error),
                OnError::Continue => {
                    warn!(item = %item.item_id, error = %error, "Failed to fetch item");
                    stats.failed += 1;
                    on_event(FetchEvent::Failed {
                        item,
                        error: &error,
                    });
                }
            }
        }
    }

    info!(
        appended = stats.appended,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        failed = stats.failed,
        "Fetch finished"
    );
    Ok(stats)
}

fn fetch_one(
    item: &RemoteMessage,
    source: &mut dyn RemoteSource,
    sink: &mut dyn LocalSink,
    options: &FetchOptions,
    mut index: Option<&mut DedupIndex>,
    stats: &mut FetchStats,
    on_event: &mut dyn FnMut(FetchEvent<'_>),
) -> Result<()> {
    let key = dedup::message_key(item);

    if let (Some(index), Some(key)) = (index.as_deref(), key.as_deref()) {
        if index.contains(key) {
            debug!(item = %item.item_id, message_id = key, "Already in mailbox");
            stats.duplicates += 1;
            on_event(FetchEvent::Duplicate {
                item,
                message_id: key,
            });
            return Ok(());
        }
    }

    let transcript = match transcribe::transcribe(item)? {
        Transcribed::Document(transcript) => transcript,
        Transcribed::Skip => {
            stats.skipped += 1;
            on_event(FetchEvent::Skipped { item });
            return Ok(());
        }
    };
    stats.transcribed += 1;
    stats.attachments_skipped += transcript.skipped_attachments.len();

    // The mailbox will be indexed by the first Message-ID actually written.
    let written_id = transcript.document.header_values("Message-ID").next();
    let remember = |index: Option<&mut DedupIndex>| {
        if let (Some(index), Some(id)) = (index, written_id) {
            index.insert(id);
        }
    };

    if options.pretend {
        remember(index.as_deref_mut());
        return Ok(());
    }

    let bytes = render::to_bytes(&transcript.document)?;
    let written = sink.append(&bytes)?;
    stats.appended += 1;
    stats.bytes_written += written;
    on_event(FetchEvent::Appended {
        item,
        bytes: written,
    });
    remember(index.as_deref_mut());

    if options.mark_read {
        source.mark_read(item)?;
        stats.marked_read += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::Path;

    use crate::model::address::EmailAddress;
    use crate::model::attachment::{Attachment, FileAttachment, Payload};
    use crate::model::remote::RawHeader;
    use crate::parser::header::message_id_from_header_block;

    #[derive(Default)]
    struct MemorySource {
        items: Vec<RemoteMessage>,
        marked: Vec<String>,
    }

    impl RemoteSource for MemorySource {
        fn list_messages(&mut self, query: &ListQuery) -> Result<Vec<RemoteMessage>> {
            let mut items: Vec<RemoteMessage> = self
                .items
                .iter()
                .filter(|m| !query.unread_only || !m.is_read)
                .cloned()
                .collect();
            if let Some(limit) = query.limit {
                items.truncate(limit);
            }
            Ok(items)
        }

        fn mark_read(&mut self, item: &RemoteMessage) -> Result<()> {
            self.marked.push(item.item_id.clone());
            if let Some(m) = self.items.iter_mut().find(|m| m.item_id == item.item_id) {
                m.is_read = true;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        messages: Vec<Vec<u8>>,
    }

    impl LocalSink for MemorySink {
        fn append(&mut self, message: &[u8]) -> Result<u64> {
            self.messages.push(message.to_vec());
            Ok(message.len() as u64)
        }

        fn message_ids(&self) -> Result<HashSet<String>> {
            Ok(self
                .messages
                .iter()
                .filter_map(|m| {
                    let end = m
                        .windows(4)
                        .position(|w| w == b"\r\n\r\n")
                        .unwrap_or(m.len());
                    message_id_from_header_block(&m[..end])
                })
                .collect())
        }

        fn location(&self) -> &Path {
            Path::new("memory")
        }
    }

    fn message(id: &str) -> RemoteMessage {
        RemoteMessage {
            item_id: id.to_string(),
            message_id: Some(format!("<{id}@example.com>")),
            headers: Some(vec![
                RawHeader::new("Message-ID", format!("<{id}@example.com>")),
                RawHeader::new("Subject", format!("Message {id}")),
            ]),
            author: Some(EmailAddress::new("Jane Doe", "jane@example.com")),
            text_body: Some("hi".into()),
            ..Default::default()
        }
    }

    fn run_collect(
        source: &mut MemorySource,
        sink: &mut MemorySink,
        options: &FetchOptions,
    ) -> (Result<FetchStats>, Vec<String>) {
        let mut events = Vec::new();
        let result = run(source, sink, options, &mut |event| {
            events.push(match event {
                FetchEvent::Fetching { index, total, item } => {
                    format!("fetching {index}/{total} {}", item.item_id)
                }
                FetchEvent::Duplicate { item, .. } => format!("duplicate {}", item.item_id),
                FetchEvent::Skipped { item } => format!("skipped {}", item.item_id),
                FetchEvent::Failed { item, .. } => format!("failed {}", item.item_id),
                FetchEvent::Appended { item, .. } => format!("appended {}", item.item_id),
            })
        });
        (result, events)
    }

    #[test]
    fn test_appends_and_marks_read() {
        let mut source = MemorySource {
            items: vec![message("a"), message("b")],
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let (stats, events) = run_collect(&mut source, &mut sink, &FetchOptions::default());
        let stats = stats.unwrap();

        assert_eq!(stats.listed, 2);
        assert_eq!(stats.appended, 2);
        assert_eq!(stats.marked_read, 2);
        assert_eq!(sink.messages.len(), 2);
        assert_eq!(source.marked, ["a", "b"]);
        assert_eq!(events[0], "fetching 1/2 a");
        assert_eq!(events[1], "appended a");
    }

    #[test]
    fn test_second_run_with_check_dupes_adds_nothing() {
        let options = FetchOptions {
            unread_only: false,
            mark_read: false,
            check_dupes: true,
            ..Default::default()
        };
        let mut source = MemorySource {
            items: vec![message("a"), message("b")],
            ..Default::default()
        };
        let mut sink = MemorySink::default();

        let first = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(first.appended, 2);

        let second = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(second.appended, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(sink.messages.len(), 2);
    }

    #[test]
    fn test_duplicates_within_one_run() {
        let options = FetchOptions {
            check_dupes: true,
            ..Default::default()
        };
        let mut copy = message("a");
        copy.item_id = "a-copy".into();
        let mut source = MemorySource {
            items: vec![message("a"), copy],
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let (stats, events) = run_collect(&mut source, &mut sink, &options);
        let stats = stats.unwrap();
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.duplicates, 1);
        assert!(events.contains(&"duplicate a-copy".to_string()));
        assert_eq!(source.marked, ["a"]);
    }

    #[test]
    fn test_pretend_writes_and_marks_nothing() {
        let options = FetchOptions {
            pretend: true,
            ..Default::default()
        };
        let mut source = MemorySource {
            items: vec![message("a")],
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let stats = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(stats.transcribed, 1);
        assert_eq!(stats.appended, 0);
        assert!(sink.messages.is_empty());
        assert!(source.marked.is_empty());
    }

    #[test]
    fn test_headerless_item_is_skipped() {
        let mut bare = message("bare");
        bare.headers = None;
        let mut source = MemorySource {
            items: vec![bare, message("b")],
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let (stats, events) = run_collect(&mut source, &mut sink, &FetchOptions::default());
        let stats = stats.unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.appended, 1);
        assert!(events.contains(&"skipped bare".to_string()));
        assert_eq!(source.marked, ["b"]);
    }

    #[test]
    fn test_remote_id_without_header_is_deduplicated() {
        let options = FetchOptions {
            unread_only: false,
            mark_read: false,
            check_dupes: true,
            ..Default::default()
        };
        let mut item = message("a");
        item.message_id = Some("<remote-1@example.com>".into());
        item.headers = Some(vec![RawHeader::new("Subject", "no id header")]);
        let mut source = MemorySource {
            items: vec![item],
            ..Default::default()
        };
        let mut sink = MemorySink::default();

        let first = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(first.appended, 1);
        assert!(sink.message_ids().unwrap().contains("<remote-1@example.com>"));

        let second = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(second.appended, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(sink.messages.len(), 1);
    }

    #[test]
    fn test_remote_id_differing_from_header_is_deduplicated() {
        let options = FetchOptions {
            unread_only: false,
            mark_read: false,
            check_dupes: true,
            ..Default::default()
        };
        let mut item = message("a");
        item.message_id = Some("<remote-view@example.com>".into());
        let mut source = MemorySource {
            items: vec![item],
            ..Default::default()
        };
        let mut sink = MemorySink::default();

        run_collect(&mut source, &mut sink, &options).0.unwrap();
        let second = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(second.appended, 0);
        assert_eq!(second.duplicates, 1);
    }

    fn broken(id: &str) -> RemoteMessage {
        let mut msg = message(id);
        msg.attachments.push(Attachment::File(FileAttachment {
            name: Some("x.bin".into()),
            content_type: "binary".into(),
            is_inline: false,
            content_id: None,
            payload: Payload::Bytes(vec![1, 2, 3]),
        }));
        msg
    }

    #[test]
    fn test_abort_on_malformed_content_type() {
        let mut source = MemorySource {
            items: vec![broken("bad"), message("b")],
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let (result, _) = run_collect(&mut source, &mut sink, &FetchOptions::default());
        assert!(matches!(result, Err(FerryError::Transcribe(_))));
        assert!(sink.messages.is_empty());
        assert!(source.marked.is_empty());
    }

    #[test]
    fn test_continue_on_error() {
        let options = FetchOptions {
            on_error: OnError::Continue,
            ..Default::default()
        };
        let mut source = MemorySource {
            items: vec![broken("bad"), message("b")],
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let (stats, events) = run_collect(&mut source, &mut sink, &options);
        let stats = stats.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.appended, 1);
        assert!(events.contains(&"failed bad".to_string()));
        assert_eq!(source.marked, ["b"]);
    }

    #[test]
    fn test_limit_and_unread_filter() {
        let mut read = message("old");
        read.is_read = true;
        let mut source = MemorySource {
            items: vec![read, message("a"), message("b"), message("c")],
            ..Default::default()
        };
        let options = FetchOptions {
            limit: Some(2),
            ..Default::default()
        };
        let mut sink = MemorySink::default();
        let stats = run_collect(&mut source, &mut sink, &options).0.unwrap();
        assert_eq!(stats.listed, 2);
        assert_eq!(source.marked, ["a", "b"]);
    }
}
