//! Attachments of a remote message.
//!
//! The remote account exposes two very different kinds of attachment: files,
//! which carry a byte payload and a MIME type, and embedded items (forwarded
//! messages, calendar entries), which expose no byte stream at all.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An attachment of a [`RemoteMessage`](super::remote::RemoteMessage).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    /// A file with a byte payload.
    File(FileAttachment),
    /// An embedded item. It has no payload and cannot be transcribed.
    Item(ItemAttachment),
}

impl Attachment {
    /// Human-readable name for logs and error messages.
    pub fn label(&self) -> &str {
        match self {
            Attachment::File(file) => file.label(),
            Attachment::Item(item) => item.name.as_deref().unwrap_or("(unnamed item)"),
        }
    }
}

/// A file attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    /// Filename shown to the user, if the remote side provided one.
    #[serde(default)]
    pub name: Option<String>,

    /// MIME content type as reported remotely (e.g. `"image/png"`).
    pub content_type: String,

    /// `true` if the attachment is rendered inside the HTML body.
    #[serde(default)]
    pub is_inline: bool,

    /// Content-ID referenced by `cid:` links in the HTML body.
    #[serde(default)]
    pub content_id: Option<String>,

    /// Where the bytes live.
    pub payload: Payload,
}

impl FileAttachment {
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.content_id.as_deref())
            .unwrap_or("(unnamed)")
    }
}

/// An embedded item attachment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemAttachment {
    #[serde(default)]
    pub name: Option<String>,

    /// Remote item class (`"message"`, `"calendar"`, ...), informational only.
    #[serde(default)]
    pub item_type: Option<String>,
}

/// Byte payload of a file attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    /// Bytes delivered with the item, base64 in serialized form.
    #[serde(rename = "base64", with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Bytes stored in a separate file.
    Path(PathBuf),
}

impl Payload {
    /// Open a reader over the payload.
    ///
    /// The returned handle owns any file descriptor it needs; dropping it
    /// closes the stream.
    pub fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        match self {
            Payload::Bytes(bytes) => Ok(Box::new(bytes.as_slice())),
            Payload::Path(path) => Ok(Box::new(File::open(path)?)),
        }
    }

    /// Make a relative `Path` payload relative to `base` instead of the CWD.
    pub fn resolve_against(&mut self, base: &Path) {
        if let Payload::Path(path) = self {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_file_attachment() {
        let json = r#"{
            "kind": "file",
            "name": "logo.png",
            "content_type": "image/png",
            "is_inline": true,
            "content_id": "img1",
            "payload": { "base64": "iVBO Rw==" }
        }"#;
        let att: Attachment = serde_json::from_str(json).unwrap();
        match att {
            Attachment::File(file) => {
                assert!(file.is_inline);
                assert_eq!(file.content_id.as_deref(), Some("img1"));
                match file.payload {
                    Payload::Bytes(bytes) => assert_eq!(bytes, b"\x89PNG"),
                    other => panic!("unexpected payload {other:?}"),
                }
            }
            other => panic!("unexpected attachment {other:?}"),
        }
    }

    #[test]
    fn test_deserialize_item_attachment() {
        let json = r#"{ "kind": "item", "name": "Fwd: minutes" }"#;
        let att: Attachment = serde_json::from_str(json).unwrap();
        assert!(matches!(att, Attachment::Item(_)));
        assert_eq!(att.label(), "Fwd: minutes");
    }

    #[test]
    fn test_payload_resolve_relative_path() {
        let mut payload = Payload::Path(PathBuf::from("blobs/report.pdf"));
        payload.resolve_against(Path::new("/spool"));
        match payload {
            Payload::Path(p) => assert_eq!(p, Path::new("/spool/blobs/report.pdf")),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_open_bytes_payload() {
        let payload = Payload::Bytes(b"hello".to_vec());
        let mut buf = String::new();
        payload.open().unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let payload = Payload::Path(PathBuf::from("/nonexistent/mailferry/blob"));
        assert!(payload.open().is_err());
    }
}
