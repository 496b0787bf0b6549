// src/utils/decode.rs

//! Response body decoding.
//!
//! The charset is taken from, in order: a byte order mark, the
//! `Content-Type` header, an `encoding=` or `charset=` declaration near the
//! start of the document. Without any of these the body is read as UTF-8.

use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;

/// How far into the body a declaration is looked for.
const SNIFF_BYTES: usize = 1024;

static DECLARED: OnceLock<Option<Regex>> = OnceLock::new();

/// Decode `bytes` to a string, replacing undecodable sequences.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect(bytes, content_type);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("Body is not clean {}, kept with replacements", encoding.name());
    }
    text.into_owned()
}

/// Encoding a body should be read with.
pub fn detect(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    content_type
        .and_then(header_charset)
        .or_else(|| declared_charset(bytes))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8)
}

fn header_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn declared_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    let head = String::from_utf8_lossy(head);
    let regex = DECLARED
        .get_or_init(|| Regex::new(r#"(?i)(?:encoding|charset)\s*=\s*["']?([a-z0-9._:-]+)"#).ok())
        .as_ref()?;
    regex
        .captures(&head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_default() {
        assert_eq!(decode_body("héllo".as_bytes(), None), "héllo");
        assert_eq!(decode_body(b"plain", Some("text/html")), "plain");
    }

    #[test]
    fn test_header_charset() {
        // "café" in Latin-1
        let body = b"caf\xe9";
        assert_eq!(
            decode_body(body, Some("text/html; charset=ISO-8859-1")),
            "café"
        );
        assert_eq!(
            decode_body(body, Some("text/html; Charset=\"windows-1252\"")),
            "café"
        );
    }

    #[test]
    fn test_declared_encoding() {
        let xml = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><rss><title>Z\xfcrich</title></rss>";
        assert!(decode_body(xml, None).contains("Zürich"));

        let html = b"<html><head><meta charset=\"windows-1252\"></head><body>\x93hi\x94</body></html>";
        assert!(decode_body(html, Some("text/html")).contains("\u{201c}hi\u{201d}"));
    }

    #[test]
    fn test_bom_wins() {
        let body = b"\xef\xbb\xbfcaf\xc3\xa9";
        assert_eq!(decode_body(body, Some("text/html; charset=ISO-8859-1")), "café");
    }
}
