//! Text encoding detection and conversion.
//!
//! The files this editor handles predate Unicode adoption: most are
//! Windows-1252, newer tools emit UTF-8, and a few localized files carry
//! UTF-16 BOMs. `Automatic` sniffs a BOM first, falls back to UTF-8
//! validation, and treats everything else as Windows-1252 so no byte
//! sequence is ever rejected outright in automatic mode.

use super::FormatError;

const BOM_UTF8: [u8; 3] = [0xEF, 0xBB, 0xBF];
const BOM_UTF16_LE: [u8; 2] = [0xFF, 0xFE];
const BOM_UTF16_BE: [u8; 2] = [0xFE, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileEncoding {
    /// Detect from BOM / UTF-8 validity on read; write as UTF-8.
    #[default]
    Automatic,
    Utf8,
    Utf16Le,
    Utf16Be,
    Windows1252,
}

/// Decode raw bytes into text, returning the resolved encoding alongside so
/// callers can re-encode the same way on save.
pub(crate) fn decode(
    bytes: &[u8],
    hint: FileEncoding,
) -> Result<(String, FileEncoding), FormatError> {
    let encoding = match hint {
        FileEncoding::Automatic => detect(bytes),
        explicit => explicit,
    };

    let text = match encoding {
        // `detect` never yields Automatic; decoding it as UTF-8 is moot.
        FileEncoding::Automatic | FileEncoding::Utf8 => {
            let body = bytes.strip_prefix(&BOM_UTF8[..]).unwrap_or(bytes);
            std::str::from_utf8(body)
                .map_err(|_| FormatError::Encoding(FileEncoding::Utf8))?
                .to_owned()
        }
        FileEncoding::Utf16Le => decode_utf16(bytes, true)?,
        FileEncoding::Utf16Be => decode_utf16(bytes, false)?,
        FileEncoding::Windows1252 => decode_windows_1252(bytes),
    };

    Ok((text, encoding))
}

/// Encode text for writing. `Automatic` writes plain UTF-8 without a BOM;
/// UTF-16 variants emit their BOM so a later automatic read resolves the
/// same encoding.
pub(crate) fn encode(text: &str, encoding: FileEncoding) -> Vec<u8> {
    match encoding {
        FileEncoding::Automatic | FileEncoding::Utf8 => text.as_bytes().to_vec(),
        FileEncoding::Utf16Le => {
            let mut out = BOM_UTF16_LE.to_vec();
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
        FileEncoding::Utf16Be => {
            let mut out = BOM_UTF16_BE.to_vec();
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out
        }
        FileEncoding::Windows1252 => text.chars().map(encode_windows_1252_char).collect(),
    }
}

fn detect(bytes: &[u8]) -> FileEncoding {
    if bytes.starts_with(&BOM_UTF8) {
        FileEncoding::Utf8
    } else if bytes.starts_with(&BOM_UTF16_LE) {
        FileEncoding::Utf16Le
    } else if bytes.starts_with(&BOM_UTF16_BE) {
        FileEncoding::Utf16Be
    } else if std::str::from_utf8(bytes).is_ok() {
        FileEncoding::Utf8
    } else {
        FileEncoding::Windows1252
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Result<String, FormatError> {
    let encoding = if little_endian {
        FileEncoding::Utf16Le
    } else {
        FileEncoding::Utf16Be
    };
    let bom = if little_endian {
        &BOM_UTF16_LE
    } else {
        &BOM_UTF16_BE
    };
    let body = bytes.strip_prefix(&bom[..]).unwrap_or(bytes);

    if body.len() % 2 != 0 {
        return Err(FormatError::Encoding(encoding));
    }

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if little_endian {
                u16::from_le_bytes(pair)
            } else {
                u16::from_be_bytes(pair)
            }
        })
        .collect();

    String::from_utf16(&units).map_err(|_| FormatError::Encoding(encoding))
}

/// The 0x80..0x9F range where Windows-1252 departs from Latin-1. The five
/// unassigned code points keep their C1 control value.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn decode_windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
            other => other as char,
        })
        .collect()
}

fn encode_windows_1252_char(c: char) -> u8 {
    match c {
        '\0'..='\u{7F}' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u8,
        other => match CP1252_HIGH.iter().position(|&mapped| mapped == other) {
            Some(index) => 0x80 + index as u8,
            None => b'?',
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::utf8_bom(&[0xEF, 0xBB, 0xBF, b'h', b'i'], FileEncoding::Utf8, "hi")]
    #[case::utf16_le(&[0xFF, 0xFE, b'h', 0, b'i', 0], FileEncoding::Utf16Le, "hi")]
    #[case::utf16_be(&[0xFE, 0xFF, 0, b'h', 0, b'i'], FileEncoding::Utf16Be, "hi")]
    #[case::plain_ascii(b"hi", FileEncoding::Utf8, "hi")]
    #[case::high_bytes(&[b'h', 0xE9], FileEncoding::Windows1252, "h\u{E9}")]
    fn automatic_detection(
        #[case] bytes: &[u8],
        #[case] expected_encoding: FileEncoding,
        #[case] expected_text: &str,
    ) {
        let (text, encoding) = decode(bytes, FileEncoding::Automatic).unwrap();
        assert_eq!(encoding, expected_encoding);
        assert_eq!(text, expected_text);
    }

    #[test]
    fn explicit_encoding_overrides_detection() {
        // 0xE9 is valid Windows-1252 but invalid standalone UTF-8.
        let err = decode(&[0xE9], FileEncoding::Utf8).unwrap_err();
        assert_eq!(err, FormatError::Encoding(FileEncoding::Utf8));

        let (text, _) = decode(&[0xE9], FileEncoding::Windows1252).unwrap();
        assert_eq!(text, "\u{E9}");
    }

    #[rstest]
    #[case(FileEncoding::Utf8)]
    #[case(FileEncoding::Utf16Le)]
    #[case(FileEncoding::Utf16Be)]
    #[case(FileEncoding::Windows1252)]
    fn encode_decode_round_trip(#[case] encoding: FileEncoding) {
        let text = "[Zone]\nnickname = caf\u{E9}\n";
        let bytes = encode(text, encoding);
        let (decoded, resolved) = decode(&bytes, encoding).unwrap();
        assert_eq!(decoded, text);
        assert_eq!(resolved, encoding);
    }

    #[test]
    fn utf16_bom_survives_automatic_round_trip() {
        let bytes = encode("hello", FileEncoding::Utf16Le);
        let (text, encoding) = decode(&bytes, FileEncoding::Automatic).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(encoding, FileEncoding::Utf16Le);
    }

    #[test]
    fn cp1252_smart_quotes_map_to_high_bytes() {
        let bytes = encode("\u{201C}hi\u{201D}", FileEncoding::Windows1252);
        assert_eq!(bytes, vec![0x93, b'h', b'i', 0x94]);
        let (text, _) = decode(&bytes, FileEncoding::Windows1252).unwrap();
        assert_eq!(text, "\u{201C}hi\u{201D}");
    }

    #[test]
    fn unmappable_char_becomes_question_mark() {
        let bytes = encode("\u{4E16}", FileEncoding::Windows1252);
        assert_eq!(bytes, b"?");
    }

    #[test]
    fn truncated_utf16_is_an_error() {
        let err = decode(&[0xFF, 0xFE, b'h'], FileEncoding::Automatic).unwrap_err();
        assert_eq!(err, FormatError::Encoding(FileEncoding::Utf16Le));
    }
}
