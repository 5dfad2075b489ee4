//! A message as fetched from the remote account, before local conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::EmailAddress;
use super::attachment::Attachment;

/// One raw header from the remote item. Names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeader {
    pub name: String,
    pub value: String,
}

impl RawHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How the remote side labels the main body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    #[serde(rename = "HTML", alias = "html", alias = "Html")]
    Html,
    #[default]
    #[serde(rename = "Text", alias = "text")]
    Text,
    /// Anything the remote side sends that we do not recognise.
    #[serde(other)]
    Unknown,
}

/// The tagged main body of a remote item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub body_type: BodyType,
    #[serde(default)]
    pub content: String,
}

/// One fetched mail item.
///
/// Read-only for everything downstream of the source: marking the item read
/// goes back through [`RemoteSource::mark_read`](crate::source::RemoteSource::mark_read).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Opaque identifier of the item on the remote side.
    #[serde(default)]
    pub item_id: String,

    /// The `Message-ID` the remote side reports, if any.
    #[serde(default)]
    pub message_id: Option<String>,

    /// When the remote account received the item. Drives newest-first order.
    #[serde(default)]
    pub received: Option<DateTime<Utc>>,

    /// Internet headers in their original order. `None` for partially
    /// synchronised items that came without any.
    #[serde(default)]
    pub headers: Option<Vec<RawHeader>>,

    #[serde(default)]
    pub author: Option<EmailAddress>,
    #[serde(default)]
    pub sender: Option<EmailAddress>,
    #[serde(default)]
    pub reply_to: Option<EmailAddress>,
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    #[serde(default)]
    pub cc: Vec<EmailAddress>,
    #[serde(default)]
    pub bcc: Vec<EmailAddress>,

    /// Plain-text rendition of the body.
    #[serde(default)]
    pub text_body: Option<String>,

    /// Main body with its type flag.
    #[serde(default)]
    pub body: Option<Body>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    #[serde(default)]
    pub is_read: bool,
}

impl RemoteMessage {
    /// The HTML body, but only when the body-type flag says it is HTML.
    pub fn html_body(&self) -> Option<&str> {
        self.body
            .as_ref()
            .filter(|b| b.body_type == BodyType::Html)
            .map(|b| b.content.as_str())
    }

    /// How the item is named in progress output: its message identifier,
    /// else the remote item id.
    pub fn display_id(&self) -> &str {
        self.message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.item_id)
    }

    /// `true` if the item carries at least one header.
    pub fn has_headers(&self) -> bool {
        self.headers.as_ref().is_some_and(|h| !h.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_body_requires_html_flag() {
        let mut msg = RemoteMessage {
            body: Some(Body {
                body_type: BodyType::Text,
                content: "<p>hi</p>".into(),
            }),
            ..Default::default()
        };
        assert_eq!(msg.html_body(), None);

        msg.body.as_mut().unwrap().body_type = BodyType::Html;
        assert_eq!(msg.html_body(), Some("<p>hi</p>"));
    }

    #[test]
    fn test_unknown_body_type() {
        let body: Body =
            serde_json::from_str(r#"{"body_type": "RTF", "content": "x"}"#).unwrap();
        assert_eq!(body.body_type, BodyType::Unknown);
    }

    #[test]
    fn test_has_headers() {
        let mut msg = RemoteMessage::default();
        assert!(!msg.has_headers());
        msg.headers = Some(Vec::new());
        assert!(!msg.has_headers());
        msg.headers = Some(vec![RawHeader::new("Subject", "x")]);
        assert!(msg.has_headers());
    }

    #[test]
    fn test_display_id_prefers_message_id() {
        let mut msg = RemoteMessage {
            item_id: "AAMkAD=".into(),
            message_id: Some("<x@example.com>".into()),
            ..Default::default()
        };
        assert_eq!(msg.display_id(), "<x@example.com>");
        msg.message_id = Some("  ".into());
        assert_eq!(msg.display_id(), "AAMkAD=");
        msg.message_id = None;
        assert_eq!(msg.display_id(), "AAMkAD=");
    }
}
