//! Transcription of remote messages into local email documents.
//!
//! [`transcribe`] is pure with respect to the remote item and the local
//! mailbox: it neither marks anything read nor writes anything. A dry run is
//! simply a call whose result gets dropped.

pub mod address;
pub mod attachment;
pub mod body;
pub mod headers;
pub mod sanitize;

use thiserror::Error;
use tracing::debug;

use crate::model::document::{DocumentBuilder, LocalEmailDocument};
use crate::model::remote::RemoteMessage;

pub use address::{format_address, format_address_list};
pub use sanitize::sanitize;

/// Reasons a single message cannot be transcribed.
#[derive(Error, Debug)]
pub enum TranscribeError {
    /// An attachment's content type has no `maintype/subtype` form.
    #[error("Attachment '{attachment}' has a malformed content type: '{content_type}'")]
    MalformedContentType {
        attachment: String,
        content_type: String,
    },

    /// An attachment's byte stream could not be read.
    #[error("Could not read attachment '{attachment}': {source}")]
    AttachmentRead {
        attachment: String,
        source: std::io::Error,
    },
}

/// Outcome of transcribing one remote message.
#[derive(Debug)]
pub enum Transcribed {
    /// The finished document.
    Document(Transcript),
    /// The item has no headers at all and is unusable.
    Skip,
}

/// A finished document plus what had to be left out of it.
#[derive(Debug)]
pub struct Transcript {
    pub document: LocalEmailDocument,
    /// Labels of embedded item attachments that were not transcribed.
    pub skipped_attachments: Vec<String>,
}

/// Map one remote message to one local email document.
pub fn transcribe(msg: &RemoteMessage) -> Result<Transcribed, TranscribeError> {
    if !msg.has_headers() {
        debug!(item = %msg.item_id, "Item has no headers, skipping");
        return Ok(Transcribed::Skip);
    }

    let builder = headers::transcribe_headers(msg, DocumentBuilder::new());

    let attachments = attachment::transcribe_attachments(&msg.attachments)?;
    let body = body::compose_body(
        msg.text_body.as_deref(),
        msg.html_body(),
        attachments.inline,
        attachments.attached,
    );

    Ok(Transcribed::Document(Transcript {
        document: builder.body(body).build(),
        skipped_attachments: attachments.skipped,
    }))
}
