//! Body composition: choose the MIME structure from what the message has.

use crate::model::document::{Leaf, MimeNode, MultipartKind};

/// Build the MIME tree for a message.
///
/// * Inline parts present: `multipart/related` holding the plain part, the
///   HTML part, then the inline parts, in that order. Mail readers take the
///   first part of a related group as the one to display.
/// * Otherwise: the plain part alone, or `multipart/alternative` when an HTML
///   part exists as well.
/// * Attached parts wrap whatever was built in `multipart/mixed`, after it.
///
/// Returns `None` for a message with nothing at all.
pub fn compose_body(
    text: Option<&str>,
    html: Option<&str>,
    inline: Vec<Leaf>,
    attached: Vec<Leaf>,
) -> Option<MimeNode> {
    let plain = text.map(|t| MimeNode::Leaf(Leaf::text("plain", t)));
    let html = html.map(|h| MimeNode::Leaf(Leaf::text("html", h)));

    let main = if inline.is_empty() {
        match (plain, html) {
            (Some(plain), Some(html)) => Some(MimeNode::Multipart(
                MultipartKind::Alternative,
                vec![plain, html],
            )),
            (plain, html) => plain.or(html),
        }
    } else {
        let parts = plain
            .into_iter()
            .chain(html)
            .chain(inline.into_iter().map(MimeNode::Leaf))
            .collect();
        Some(MimeNode::Multipart(MultipartKind::Related, parts))
    };

    if attached.is_empty() {
        return main;
    }

    let parts = main
        .into_iter()
        .chain(attached.into_iter().map(MimeNode::Leaf))
        .collect();
    Some(MimeNode::Multipart(MultipartKind::Mixed, parts))
}
