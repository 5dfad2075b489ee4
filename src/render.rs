//! Serialization of a [`LocalEmailDocument`] into RFC 5322 bytes.
//!
//! Headers are written in document order. The MIME writer owns the
//! body-structure headers, so a leftover top-level `Content-Transfer-Encoding`
//! is not written, and a few well-known names are canonicalized so the writer
//! recognises them instead of adding its own `Message-ID`, `Date` or
//! `MIME-Version`.

use std::borrow::Cow;

use mail_builder::headers::content_type::ContentType;
use mail_builder::headers::raw::Raw;
use mail_builder::mime::{BodyPart, MimePart};
use mail_builder::MessageBuilder;
use tracing::warn;

use crate::error::{FerryError, Result};
use crate::model::document::{
    is_valid_header_name, Content, Disposition, Leaf, LocalEmailDocument, MimeNode,
};

const CANONICAL_NAMES: [&str; 3] = ["Message-ID", "Date", "MIME-Version"];

/// Render the document as a complete message with CRLF line endings.
pub fn to_bytes(doc: &LocalEmailDocument) -> Result<Vec<u8>> {
    let mut builder = MessageBuilder::new();
    for (name, value) in doc.headers() {
        if let Some(name) = writable_name(name) {
            builder = builder.header(name, Raw::new(value.clone()));
        }
    }

    let body = match doc.body() {
        Some(node) => mime_part(node),
        None => MimePart::new(text_content_type("text/plain"), BodyPart::Text(Cow::Borrowed(""))),
    };

    builder
        .body(body)
        .write_to_vec()
        .map_err(|e| FerryError::Render(e.to_string()))
}

fn writable_name(name: &str) -> Option<Cow<'static, str>> {
    if !is_valid_header_name(name) {
        warn!(name = ?name, "Not writing header with invalid name");
        return None;
    }
    if name.eq_ignore_ascii_case("content-transfer-encoding") {
        return None;
    }
    match CANONICAL_NAMES
        .iter()
        .find(|canonical| name.eq_ignore_ascii_case(canonical))
    {
        Some(canonical) => Some(Cow::Borrowed(*canonical)),
        None => Some(Cow::Owned(name.to_string())),
    }
}

fn text_content_type(essence: impl Into<Cow<'static, str>>) -> ContentType<'static> {
    ContentType::new(essence).attribute("charset", "utf-8")
}

fn mime_part(node: &MimeNode) -> MimePart<'static> {
    match node {
        MimeNode::Multipart(kind, parts) => MimePart::new(
            ContentType::new(format!("multipart/{}", kind.subtype())),
            BodyPart::Multipart(parts.iter().map(mime_part).collect()),
        ),
        MimeNode::Leaf(leaf) => leaf_part(leaf),
    }
}

fn leaf_part(leaf: &Leaf) -> MimePart<'static> {
    let essence = leaf.media_type.to_string();
    let mut part = match &leaf.content {
        Content::Text(text) => MimePart::new(
            text_content_type(essence),
            BodyPart::Text(Cow::Owned(text.clone())),
        ),
        Content::Binary(bytes) => MimePart::new(
            ContentType::new(essence),
            BodyPart::Binary(Cow::Owned(bytes.clone())),
        ),
    };

    part = match &leaf.disposition {
        Some(Disposition::Inline) => part.inline(),
        Some(Disposition::Attachment(Some(filename))) => part.attachment(filename.clone()),
        Some(Disposition::Attachment(None)) => {
            part.header("Content-Disposition", Raw::new("attachment"))
        }
        None => part,
    };

    if let Some(cid) = &leaf.content_id {
        part = part.cid(cid.trim_matches(|c| c == '<' || c == '>').to_string());
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::{DocumentBuilder, MediaType, MultipartKind};
    use mail_parser::{MessageParser, MimeHeaders};

    fn render(doc: &LocalEmailDocument) -> Vec<u8> {
        to_bytes(doc).unwrap()
    }

    #[test]
    fn test_writable_name() {
        assert_eq!(writable_name("Message-Id").as_deref(), Some("Message-ID"));
        assert_eq!(writable_name("mime-version").as_deref(), Some("MIME-Version"));
        assert_eq!(writable_name("X-Custom").as_deref(), Some("X-Custom"));
        assert_eq!(writable_name("Content-Transfer-Encoding"), None);
        assert_eq!(writable_name(""), None);
        assert_eq!(writable_name("X-A: 1\r\nBcc"), None);
        assert_eq!(writable_name("Sub ject"), None);
    }

    #[test]
    fn test_headers_in_order_and_message_id_kept() {
        let doc = DocumentBuilder::new()
            .header("Message-Id", "<keep@example.com>")
            .header("Subject", "Fakultat Statistik")
            .header("From", "\"Jane Doe\" <jane@example.com>")
            .body(Some(MimeNode::Leaf(Leaf::text("plain", "hi"))))
            .build();
        let bytes = render(&doc);
        let text = String::from_utf8_lossy(&bytes);

        let subject = text.find("Subject: Fakultat Statistik").unwrap();
        let from = text.find("From: \"Jane Doe\" <jane@example.com>").unwrap();
        assert!(subject < from);
        assert_eq!(text.matches("Message-ID:").count(), 1);

        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.message_id(), Some("keep@example.com"));
        assert_eq!(parsed.body_text(0).as_deref().map(str::trim), Some("hi"));
    }

    #[test]
    fn test_invalid_header_name_cannot_forge_lines() {
        let doc = DocumentBuilder::new()
            .header("X-A: 1\r\nBcc", "victim@example.com")
            .header("Subject", "s")
            .build();
        let text = String::from_utf8(render(&doc)).unwrap();
        assert!(!text.contains("Bcc"));
        assert!(!text.contains("victim@example.com"));
        assert!(text.contains("Subject: s"));
    }

    #[test]
    fn test_empty_body_renders() {
        let doc = DocumentBuilder::new().header("Subject", "nothing").build();
        let bytes = render(&doc);
        let parsed = MessageParser::default().parse(&bytes).unwrap();
        assert_eq!(parsed.subject(), Some("nothing"));
        assert_eq!(parsed.attachment_count(), 0);
    }

    #[test]
    fn test_nested_structure_round_trips() {
        let png = Leaf::binary(MediaType::new("image", "png"), vec![0x89, b'P', b'N', b'G'])
            .with_disposition(Disposition::Inline)
            .with_content_id(Some("<img1>".into()));
        let pdf = Leaf::binary(MediaType::new("application", "pdf"), b"%PDF-1.4".to_vec())
            .with_disposition(Disposition::Attachment(Some("report.pdf".into())));
        let body = MimeNode::Multipart(
            MultipartKind::Mixed,
            vec![
                MimeNode::Multipart(
                    MultipartKind::Related,
                    vec![
                        MimeNode::Leaf(Leaf::text("html", "<img src=\"cid:img1\">")),
                        MimeNode::Leaf(png),
                    ],
                ),
                MimeNode::Leaf(pdf),
            ],
        );
        let doc = DocumentBuilder::new()
            .header("Subject", "report")
            .body(Some(body))
            .build();

        let bytes = render(&doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Content-ID: <img1>"));
        assert!(!text.contains("<<img1>>"));

        let parsed = MessageParser::default().parse(&bytes).unwrap();
        let root = parsed.parts[0].content_type().unwrap();
        assert_eq!(root.ctype(), "multipart");
        assert_eq!(root.subtype(), Some("mixed"));
        assert!(parsed.body_html(0).unwrap().contains("cid:img1"));

        let names: Vec<String> = parsed
            .attachments()
            .filter_map(|a| a.attachment_name().map(String::from))
            .collect();
        assert!(names.contains(&"report.pdf".to_string()));
    }
}
