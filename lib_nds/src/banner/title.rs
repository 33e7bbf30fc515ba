use std::ffi::OsStr;

use log::debug;

use super::format::TitleRow;
use crate::constants::{TITLE_LENGTH, TITLE_LINE_SEPARATOR, TITLE_NEWLINE};

/// Encodes a title into a zero-terminated row of UTF-16 code units.
///
/// `;` separates lines. Text longer than the row is cut at a character
/// boundary so the terminator always fits. Returns `true` as the second value
/// when the input was not valid Unicode and had to be copied byte for byte.
pub fn encode_title(text: &OsStr) -> (TitleRow, bool) {
    match text.to_str() {
        Some(text) => (encode_title_str(text), false),
        None => {
            let mut row = [0u16; TITLE_LENGTH];
            for (unit, &byte) in row
                .iter_mut()
                .zip(text.as_encoded_bytes().iter().take(TITLE_LENGTH - 1))
            {
                *unit = if byte == TITLE_LINE_SEPARATOR as u8 {
                    TITLE_NEWLINE
                } else {
                    byte as u16
                };
            }
            (row, true)
        }
    }
}

pub fn encode_title_str(text: &str) -> TitleRow {
    let mut row = [0u16; TITLE_LENGTH];
    let mut len = 0;
    let mut buf = [0u16; 2];

    for ch in text.chars() {
        let units: &[u16] = if ch == TITLE_LINE_SEPARATOR {
            buf[0] = TITLE_NEWLINE;
            &buf[..1]
        } else {
            ch.encode_utf16(&mut buf)
        };
        if len + units.len() > TITLE_LENGTH - 1 {
            debug!("Title truncated after {} code units", len);
            break;
        }
        row[len..len + units.len()].copy_from_slice(units);
        len += units.len();
    }
    row
}

/// Splits a title row into its lines.
///
/// Lines that are not valid UTF-16 are shown as ASCII with `_` in place of
/// anything outside it.
pub fn decode_title_lines(row: &TitleRow) -> Vec<String> {
    let end = row.iter().position(|&unit| unit == 0).unwrap_or(row.len());
    if end == 0 {
        return Vec::new();
    }
    row[..end]
        .split(|&unit| unit == TITLE_NEWLINE)
        .map(|line| {
            String::from_utf16(line).unwrap_or_else(|_| {
                line.iter()
                    .map(|&unit| if unit < 0x80 { unit as u8 as char } else { '_' })
                    .collect()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_becomes_newline() {
        let row = encode_title_str("Hello;World;Foo");
        let expected: Vec<u16> = "Hello\nWorld\nFoo".encode_utf16().collect();
        assert_eq!(&row[..expected.len()], expected.as_slice());
        assert_eq!(row[expected.len()], 0);
        assert_eq!(decode_title_lines(&row), vec!["Hello", "World", "Foo"]);
    }

    #[test]
    fn test_truncation_keeps_terminator() {
        let text = "x".repeat(200);
        let row = encode_title_str(&text);
        assert!(row[..127].iter().all(|&unit| unit == 'x' as u16));
        assert_eq!(row[127], 0);
        assert_eq!(decode_title_lines(&row)[0].len(), 127);
    }

    #[test]
    fn test_truncation_does_not_split_surrogates() {
        let text = format!("{}{}", "a".repeat(126), '\u{1F600}');
        let row = encode_title_str(&text);
        assert_eq!(row[125], 'a' as u16);
        assert_eq!(row[126], 0);
    }

    #[test]
    fn test_non_ascii_roundtrip() {
        let row = encode_title_str("ポケモン;Édition");
        assert_eq!(decode_title_lines(&row), vec!["ポケモン", "Édition"]);
    }

    #[test]
    fn test_invalid_utf16_falls_back() {
        let mut row = [0u16; TITLE_LENGTH];
        row[..4].copy_from_slice(&[b'A' as u16, 0xD800, 0x00E9, b'B' as u16]);
        assert_eq!(decode_title_lines(&row), vec!["A__B"]);
    }

    #[test]
    fn test_unterminated_row() {
        let row = [b'z' as u16; TITLE_LENGTH];
        let lines = decode_title_lines(&row);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), TITLE_LENGTH);
    }

    #[test]
    fn test_empty_title() {
        assert!(decode_title_lines(&encode_title_str("")).is_empty());
    }

    #[test]
    fn test_unicode_input_is_not_degraded() {
        let (row, degraded) = encode_title(OsStr::new("Game;Maker"));
        assert!(!degraded);
        assert_eq!(row[4], TITLE_NEWLINE);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_input_is_copied() {
        use std::os::unix::ffi::OsStrExt;

        let (row, degraded) = encode_title(OsStr::from_bytes(b"A\xFFB;C"));
        assert!(degraded);
        assert_eq!(&row[..6], &[0x41, 0xFF, 0x42, TITLE_NEWLINE, 0x43, 0]);
    }
}
