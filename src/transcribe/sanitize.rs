//! Header value sanitizer.
//!
//! Values coming back from the remote account may contain arbitrary Unicode
//! (or garbage left over from broken re-encoding). Everything we write into a
//! header goes through [`sanitize`], which transliterates to the closest ASCII.

use deunicode::deunicode_with_tofu;

/// Transliterate `value` to printable ASCII.
///
/// Never fails. Characters without an ASCII approximation are dropped and
/// control characters (including CR and LF) become spaces, so the result is
/// always safe to place on a single header line.
pub fn sanitize(value: &str) -> String {
    let ascii = deunicode_with_tofu(value, "");
    ascii
        .chars()
        .map(|c| if c.is_ascii_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_unchanged() {
        assert_eq!(sanitize("Re: quarterly report"), "Re: quarterly report");
    }

    #[test]
    fn test_transliterates_latin() {
        assert_eq!(sanitize("Fakultät Statistik"), "Fakultat Statistik");
        assert_eq!(sanitize("Résumé"), "Resume");
    }

    #[test]
    fn test_control_characters_become_spaces() {
        assert_eq!(sanitize("a\r\nBcc: evil@example.com"), "a  Bcc: evil@example.com");
        assert_eq!(sanitize("tab\there"), "tab here");
    }

    #[test]
    fn test_empty_and_unmappable() {
        assert_eq!(sanitize(""), "");
        assert!(sanitize("\u{FFFF}").is_ascii());
    }

    #[test]
    fn test_output_is_always_ascii() {
        for input in ["山田太郎", "😀 party", "Ω≈ç√", "\u{0}\u{7f}"] {
            assert!(sanitize(input).is_ascii(), "not ascii for {input:?}");
        }
    }
}
