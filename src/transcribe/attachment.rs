//! Attachment transcription: remote file attachments become MIME leaves.

use std::io::Read;

use tracing::{debug, warn};

use crate::model::attachment::{Attachment, FileAttachment};
use crate::model::document::{Disposition, Leaf, MediaType};

use super::TranscribeError;

/// Attachments of one message, transcribed and split by placement.
#[derive(Debug, Default)]
pub struct TranscribedAttachments {
    /// Parts that belong under the `multipart/related` root.
    pub inline: Vec<Leaf>,
    /// Ordinary attachments, appended last.
    pub attached: Vec<Leaf>,
    /// Labels of embedded items that could not be transcribed.
    pub skipped: Vec<String>,
}

/// Transcribe every attachment of a message, preserving order within each group.
///
/// Embedded items are logged and skipped. The first file attachment that
/// fails aborts the whole call.
pub fn transcribe_attachments(
    attachments: &[Attachment],
) -> Result<TranscribedAttachments, TranscribeError> {
    let mut out = TranscribedAttachments::default();

    for attachment in attachments {
        match attachment {
            Attachment::File(file) => {
                let leaf = transcribe_file(file)?;
                if file.is_inline {
                    out.inline.push(leaf);
                } else {
                    out.attached.push(leaf);
                }
            }
            Attachment::Item(item) => {
                warn!(
                    attachment = attachment.label(),
                    item_type = item.item_type.as_deref().unwrap_or("unknown"),
                    "Embedded item attachment cannot be transcribed, skipping"
                );
                out.skipped.push(attachment.label().to_string());
            }
        }
    }

    Ok(out)
}

/// Turn one file attachment into a leaf part.
pub fn transcribe_file(file: &FileAttachment) -> Result<Leaf, TranscribeError> {
    let media_type = split_content_type(&file.content_type).ok_or_else(|| {
        TranscribeError::MalformedContentType {
            attachment: file.label().to_string(),
            content_type: file.content_type.clone(),
        }
    })?;

    let bytes = read_payload(file)?;
    debug!(
        attachment = file.label(),
        content_type = %media_type,
        size = bytes.len(),
        inline = file.is_inline,
        "Transcribed attachment"
    );

    let leaf = Leaf::binary(media_type, bytes);
    Ok(if file.is_inline {
        leaf.with_disposition(Disposition::Inline)
            .with_content_id(file.content_id.clone())
    } else {
        leaf.with_disposition(Disposition::Attachment(file.name.clone()))
    })
}

/// Split `"maintype/subtype"`; parameters after `;` are ignored.
///
/// Returns `None` when there is no `/` or either half is empty.
pub fn split_content_type(content_type: &str) -> Option<MediaType> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let (maintype, subtype) = essence.split_once('/')?;
    let (maintype, subtype) = (maintype.trim(), subtype.trim());
    if maintype.is_empty() || subtype.is_empty() {
        return None;
    }
    Some(MediaType::new(
        maintype.to_ascii_lowercase(),
        subtype.to_ascii_lowercase(),
    ))
}

/// Read the whole payload; the stream is closed when this returns, on every path.
fn read_payload(file: &FileAttachment) -> Result<Vec<u8>, TranscribeError> {
    let read_error = |source| TranscribeError::AttachmentRead {
        attachment: file.label().to_string(),
        source,
    };

    let mut stream = file.payload.open().map_err(read_error)?;
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).map_err(read_error)?;
    Ok(bytes)
}
