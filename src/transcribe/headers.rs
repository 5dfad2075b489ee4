//! Header transcription: raw remote headers first, structured address
//! headers after them.

use tracing::{debug, warn};

use crate::model::document::{is_valid_header_name, DocumentBuilder};
use crate::model::remote::{RawHeader, RemoteMessage};
use crate::parser::header::{decode_header_value, normalize_message_id};

use super::address::{format_address, format_address_list};
use super::sanitize::sanitize;

/// Copy the remote headers into `builder`, then add the address headers.
///
/// `Content-Type` is never copied: it is derived from the body that the
/// transcriber builds. Headers whose name is not a valid field name are
/// dropped. When no raw `Message-ID` survives, the identifier reported by
/// the remote side is written instead. A raw `From` header and the
/// structured one can both end up in the document; the structured one comes
/// last.
pub fn transcribe_headers(msg: &RemoteMessage, mut builder: DocumentBuilder) -> DocumentBuilder {
    let mut has_message_id = false;

    for header in msg.headers.iter().flatten() {
        let name = header.name.trim();
        if !is_valid_header_name(name) {
            warn!(item = %msg.item_id, name = ?header.name, "Dropping header with invalid name");
            continue;
        }
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        let value = clean_value(&header.value);
        if is_message_id(header) {
            if normalize_message_id(&value).is_empty() {
                debug!(item = %msg.item_id, "Dropping empty Message-ID header");
                continue;
            }
            has_message_id = true;
        }
        builder = builder.header(name, value);
    }

    if !has_message_id {
        if let Some(id) = msg.message_id.as_deref().and_then(clean_message_id) {
            builder = builder.header("Message-ID", id);
        }
    }

    if let Some(author) = &msg.author {
        builder = builder.header("From", format_address(author));
    }
    if let Some(sender) = &msg.sender {
        builder = builder.header("Sender", format_address(sender));
    }
    if let Some(reply_to) = &msg.reply_to {
        builder = builder.header("Reply-To", format_address(reply_to));
    }

    for (name, list) in [("To", &msg.to), ("Cc", &msg.cc), ("Bcc", &msg.bcc)] {
        if !list.is_empty() {
            builder = builder.header(name, format_address_list(list));
        }
    }

    builder
}

/// The `Message-ID` the transcribed document will carry, in `<...>` form.
///
/// This is the first non-empty raw `Message-ID` header, else the identifier
/// reported by the remote side. `None` when the item has neither, in which
/// case the renderer generates an identifier of its own.
pub fn document_message_id(msg: &RemoteMessage) -> Option<String> {
    msg.headers
        .iter()
        .flatten()
        .filter(|h| is_message_id(h))
        .find_map(|h| clean_message_id(&h.value))
        .or_else(|| msg.message_id.as_deref().and_then(clean_message_id))
}

fn is_message_id(header: &RawHeader) -> bool {
    header.name.trim().eq_ignore_ascii_case("message-id")
}

fn clean_message_id(raw: &str) -> Option<String> {
    let id = normalize_message_id(&clean_value(raw));
    (!id.is_empty()).then_some(id)
}

/// Decode the value (encoded words, charset mix-ups), then force to ASCII.
pub fn clean_value(raw: &str) -> String {
    sanitize(&decode_header_value(raw)).trim().to_string()
}
