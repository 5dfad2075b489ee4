//! The local email document produced by transcription.
//!
//! A document is a header list plus an optional MIME tree. It is put together
//! with [`DocumentBuilder`] and only handed out once complete.

/// A MIME media type split into its two halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub maintype: String,
    pub subtype: String,
}

impl MediaType {
    pub fn new(maintype: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            maintype: maintype.into(),
            subtype: subtype.into(),
        }
    }

    pub fn text(subtype: &str) -> Self {
        Self::new("text", subtype)
    }

    pub fn is(&self, maintype: &str, subtype: &str) -> bool {
        self.maintype.eq_ignore_ascii_case(maintype) && self.subtype.eq_ignore_ascii_case(subtype)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.maintype, self.subtype)
    }
}

/// The multipart flavours the transcriber builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    Alternative,
    Related,
    Mixed,
}

impl MultipartKind {
    pub fn subtype(self) -> &'static str {
        match self {
            MultipartKind::Alternative => "alternative",
            MultipartKind::Related => "related",
            MultipartKind::Mixed => "mixed",
        }
    }
}

/// Leaf content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

/// `Content-Disposition` of a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Rendered in place, referenced by `cid:` from the HTML part.
    Inline,
    /// Downloadable file with an optional filename.
    Attachment(Option<String>),
}

/// A single non-multipart body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub media_type: MediaType,
    pub content: Content,
    pub disposition: Option<Disposition>,
    pub content_id: Option<String>,
}

impl Leaf {
    pub fn text(subtype: &str, text: impl Into<String>) -> Self {
        Self {
            media_type: MediaType::text(subtype),
            content: Content::Text(text.into()),
            disposition: None,
            content_id: None,
        }
    }

    pub fn binary(media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            media_type,
            content: Content::Binary(bytes),
            disposition: None,
            content_id: None,
        }
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn with_content_id(mut self, cid: Option<String>) -> Self {
        self.content_id = cid;
        self
    }

    /// Text of the part, if it holds text.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(t) => Some(t),
            Content::Binary(_) => None,
        }
    }
}

/// A node of the MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    Leaf(Leaf),
    Multipart(MultipartKind, Vec<MimeNode>),
}

impl MimeNode {
    /// The media type this node will be written with.
    pub fn media_type(&self) -> MediaType {
        match self {
            MimeNode::Leaf(leaf) => leaf.media_type.clone(),
            MimeNode::Multipart(kind, _) => MediaType::new("multipart", kind.subtype()),
        }
    }

    /// Child parts of a multipart node; empty for leaves.
    pub fn parts(&self) -> &[MimeNode] {
        match self {
            MimeNode::Leaf(_) => &[],
            MimeNode::Multipart(_, parts) => parts,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            MimeNode::Leaf(leaf) => Some(leaf),
            MimeNode::Multipart(..) => None,
        }
    }
}

/// `true` if `name` can be written as a header field name: one or more
/// printable ASCII characters other than `:` (RFC 5322 `ftext`).
pub fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

/// A finished local email document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEmailDocument {
    headers: Vec<(String, String)>,
    body: Option<MimeNode>,
}

impl LocalEmailDocument {
    /// Headers in the order they will be written.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// All values of a header (case-insensitive), in order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The last value of a header, which is the one mail readers show.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The MIME tree; `None` for a message without any body.
    pub fn body(&self) -> Option<&MimeNode> {
        self.body.as_ref()
    }

    /// Top-level media type, if there is a body.
    pub fn media_type(&self) -> Option<MediaType> {
        self.body.as_ref().map(MimeNode::media_type)
    }
}

/// Accumulates headers and a body, then yields the document.
#[derive(Debug, Default)]
#[must_use]
pub struct DocumentBuilder {
    headers: Vec<(String, String)>,
    body: Option<MimeNode>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header. Existing headers with the same name are kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Option<MimeNode>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> LocalEmailDocument {
        LocalEmailDocument {
            headers: self.headers,
            body: self.body,
        }
    }
}
