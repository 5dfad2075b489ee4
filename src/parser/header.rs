//! RFC 5322 header handling: folding, encoded-words (RFC 2047) and repair of
//! text that was decoded with the wrong charset somewhere upstream.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use tracing::warn;

/// Encoded words in the wild are often missing their `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How many rounds of mojibake repair to attempt on one value.
const MAX_REPAIR_ROUNDS: usize = 3;

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Get the first value for a header name (case-insensitive).
pub fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

/// Extract the `Message-ID` from a raw header block, in `<...>` form.
pub fn message_id_from_header_block(raw_headers: &[u8]) -> Option<String> {
    let text = decode_header_bytes(raw_headers);
    let headers = unfold_headers(&text);
    get_header(&headers, "message-id")
        .map(|v| normalize_message_id(&v))
        .filter(|id| !id.is_empty())
}

/// Canonical form of a message identifier, used as the dedup key.
///
/// Keeps the first `<...>` token if there is one, otherwise wraps the trimmed
/// value in angle brackets.
pub fn normalize_message_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start..start + end + 1].to_string();
        }
    }
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("<{trimmed}>")
    }
}

/// Decode a header value for display.
///
/// RFC 2047 encoded words are decoded, and a run of adjacent words in the
/// same charset is decoded as one byte string, so a character split across
/// two words survives. Whitespace between adjacent words is dropped. Every
/// decoded run and every literal stretch in between gets a mojibake repair
/// pass. Malformed words are kept as literal text.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
pub fn decode_header_value(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut run: Option<(&str, Vec<u8>)> = None;
    let mut rest = input;

    while let Some((start, word, end)) = find_encoded_word(rest) {
        let gap = &rest[..start];
        let adjacent = run.is_some() && gap.trim().is_empty();
        if !adjacent {
            flush_run(&mut run, &mut out);
            out.push_str(&repair_mojibake(gap));
        }
        let same_charset = run
            .as_ref()
            .is_some_and(|(charset, _)| charset.eq_ignore_ascii_case(word.charset));
        if same_charset {
            if let Some((_, bytes)) = run.as_mut() {
                bytes.extend_from_slice(&word.bytes);
            }
        } else {
            flush_run(&mut run, &mut out);
            run = Some((word.charset, word.bytes));
        }
        rest = &rest[end..];
    }

    flush_run(&mut run, &mut out);
    out.push_str(&repair_mojibake(rest));
    out
}

/// One encoded word with its payload already transfer-decoded.
struct EncodedWord<'a> {
    charset: &'a str,
    bytes: Vec<u8>,
}

fn flush_run(run: &mut Option<(&str, Vec<u8>)>, out: &mut String) {
    if let Some((charset, bytes)) = run.take() {
        out.push_str(&repair_mojibake(&decode_charset(charset, &bytes)));
    }
}

/// Locate the first well-formed encoded word. Returns its start offset, the
/// word, and the offset just past its closing `?=`.
fn find_encoded_word(s: &str) -> Option<(usize, EncodedWord<'_>, usize)> {
    let mut from = 0;
    while let Some(offset) = s[from..].find("=?") {
        let start = from + offset;
        if let Some((word, len)) = parse_encoded_word(&s[start + 2..]) {
            return Some((start, word, start + 2 + len));
        }
        from = start + 2;
    }
    None
}

/// Parse `charset?encoding?text?=` (the leading `=?` already stripped).
/// Returns the word and the number of bytes it spans.
fn parse_encoded_word(s: &str) -> Option<(EncodedWord<'_>, usize)> {
    let mut fields = s.splitn(3, '?');
    let charset = fields.next()?;
    let encoding = fields.next()?;
    let tail = fields.next()?;
    let text_len = tail.find("?=")?;
    let text = &tail[..text_len];

    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(text.trim()).ok()?,
        "Q" | "q" => decode_q_encoding(text),
        _ => return None,
    };

    let len = charset.len() + 1 + encoding.len() + 1 + text_len + 2;
    Some((EncodedWord { charset, bytes }, len))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let digit = |c: u8| (c as char).to_digit(16);
    Some((digit(hi)? * 16 + digit(lo)?) as u8)
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 allows a language suffix: "utf-8*de"
    let charset = charset.split('*').next().unwrap_or(charset);
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match encoding_rs::Encoding::for_label(charset.as_bytes()) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Undo UTF-8 text that was decoded as Windows-1252 (`FakultÃ¤t` → `Fakultät`).
///
/// Applied repeatedly, since some values went through the mistake twice. A
/// round only takes effect when the re-encoded bytes form valid UTF-8 that
/// actually contains multi-byte sequences, so genuine Latin-1 text such as
/// `café` is left alone.
pub fn repair_mojibake(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_REPAIR_ROUNDS {
        if current.is_ascii() {
            break;
        }
        let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(&current);
        if had_errors || bytes.is_ascii() {
            break;
        }
        match std::str::from_utf8(&bytes) {
            Ok(repaired) if repaired != current => current = repaired.to_string(),
            _ => break,
        }
    }
    current
}
