//! Payout list parsing with encoding auto-detection.
//!
//! Input is a free-form list, one recipient per line:
//!
//! ```text
//! # comment lines and blank lines are skipped
//! alice,12.5
//! 743854752713932923 100
//! bob#4821=0.25
//! ```
//!
//! Each remaining line is split on runs of tab, comma, equals or space;
//! the first token is the identity, the second the amount, anything after
//! is ignored. Line numbers are physical and 1-indexed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// CSV parsing error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "Line {}: {}", self.line, self.message)
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// One recipient line, split but not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRow {
    /// Physical line number (1-indexed).
    pub line: usize,
    pub identity: String,
    pub amount: String,
}

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\t,= ]+").expect("valid separator pattern"));

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unrecognised: lossy UTF-8.
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the encoding and decode, dropping a leading byte-order mark.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    let encoding = detect_encoding(bytes);
    decode_content(bytes, &encoding)
}

/// Read and decode a payout list file.
pub fn read_payout_file<P: AsRef<Path>>(path: P) -> Result<String, CsvError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e))
    })?;
    Ok(decode_bytes(&bytes))
}

/// Split a payout list into rows.
///
/// Blank and `#` lines produce nothing. A line without an identity or an
/// amount token produces an error for that line only.
pub fn split_rows(text: &str) -> Vec<Result<PayoutRow, CsvError>> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }

            let mut tokens = SEPARATORS.split(trimmed);
            let identity = tokens.next().unwrap_or("");
            let amount = tokens.next().unwrap_or("");

            Some(if identity.is_empty() {
                Err(CsvError::new(line, "Missing 'identity'"))
            } else if amount.is_empty() {
                Err(CsvError::new(line, "Missing 'amount'"))
            } else {
                Ok(PayoutRow {
                    line,
                    identity: identity.to_string(),
                    amount: amount.to_string(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_rows(text: &str) -> Vec<(usize, String, String)> {
        split_rows(text)
            .into_iter()
            .filter_map(Result::ok)
            .map(|r| (r.line, r.identity, r.amount))
            .collect()
    }

    #[test]
    fn test_separators() {
        let rows = ok_rows("alice,1\nbob\t2\ncarol=3\ndave 4\nerin ,\t 5");
        assert_eq!(
            rows,
            vec![
                (1, "alice".into(), "1".into()),
                (2, "bob".into(), "2".into()),
                (3, "carol".into(), "3".into()),
                (4, "dave".into(), "4".into()),
                (5, "erin".into(), "5".into()),
            ]
        );
    }

    #[test]
    fn test_comments_and_blanks_keep_line_numbers() {
        let text = "# header\n\nalice,1\n   \n  # note\nbob,2\n";
        let rows = ok_rows(text);
        assert_eq!(rows[0].0, 3);
        assert_eq!(rows[1].0, 6);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_extra_tokens_ignored() {
        let rows = ok_rows("alice,1.5,memo,more");
        assert_eq!(rows, vec![(1, "alice".into(), "1.5".into())]);
    }

    #[test]
    fn test_missing_tokens() {
        let rows = split_rows("alice\n,5\nbob,\ncarol,7");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].as_ref().unwrap_err().to_string(), "Line 1: Missing 'amount'");
        assert_eq!(rows[1].as_ref().unwrap_err().to_string(), "Line 2: Missing 'identity'");
        assert_eq!(rows[2].as_ref().unwrap_err().to_string(), "Line 3: Missing 'amount'");
        assert!(rows[3].is_ok());
    }

    #[test]
    fn test_crlf_input() {
        let rows = ok_rows("alice,1\r\nbob,2\r\n");
        assert_eq!(rows[1], (2, "bob".into(), "2".into()));
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = b"\xEF\xBB\xBFalice,1";
        assert_eq!(decode_bytes(bytes), "alice,1");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_error_message_format() {
        assert_eq!(CsvError::new(5, "bad").to_string(), "Line 5: bad");
        assert_eq!(CsvError::new(0, "unreadable").to_string(), "unreadable");
    }
}
