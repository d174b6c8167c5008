//! Content-Transfer-Encoding values and body codecs.
//!
//! Supports Base64 and Quoted-Printable (RFC 2045). Identity encodings pass
//! bytes through untouched.

use std::fmt;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{Error, Result};

/// Maximum line length for encoded body lines.
const MAX_LINE_LENGTH: usize = 76;

/// Base64 decoder that tolerates missing or extra padding.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Content transfer encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data with line structure.
    EightBit,
    /// Arbitrary binary data.
    Binary,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
    /// Unrecognized token, kept verbatim.
    Other(String),
}

impl TransferEncoding {
    /// Parses a Content-Transfer-Encoding token. Case-insensitive.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token.to_ascii_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Other(token.to_string()),
        }
    }

    /// Returns the header token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Other(token) => token,
        }
    }

    /// Encodes raw bytes for transport.
    #[must_use]
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => encode_base64(data),
            Self::QuotedPrintable => encode_quoted_printable(data),
            Self::SevenBit | Self::EightBit | Self::Binary | Self::Other(_) => data.to_vec(),
        }
    }

    /// Decodes transport bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Base64Decode`] if Base64 input is malformed and
    /// [`Error::InvalidEncoding`] for an unrecognized token, whose bytes
    /// cannot be recovered.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(data),
            Self::QuotedPrintable => Ok(decode_quoted_printable(data)),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.to_vec()),
            Self::Other(token) => Err(Error::InvalidEncoding(token.clone())),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodes data as Base64, wrapped at 76 columns with CRLF.
#[must_use]
pub fn encode_base64(data: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(data);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 38 + 2);
    for (i, line) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(line);
    }
    out
}

/// Decodes Base64 data, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable (RFC 2045).
///
/// CRLF pairs are kept as hard line breaks; lone CR and LF are escaped.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    let mut line_length = 0;
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte == b'\r' && data.get(i + 1) == Some(&b'\n') {
            out.extend_from_slice(b"\r\n");
            line_length = 0;
            i += 2;
            continue;
        }

        let at_line_end = data.get(i + 1).is_none() || data[i + 1..].starts_with(b"\r\n");
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Whitespace before a line break would be stripped in transit
            b' ' | b'\t' => !at_line_end,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Keep room for the soft break marker
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.extend_from_slice(b"=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(byte);
        } else {
            out.push(b'=');
            out.extend_from_slice(&hex_pair(byte));
        }
        line_length += width;
        i += 1;
    }

    out
}

/// Decodes Quoted-Printable bytes. Malformed escapes are kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly padded with whitespace
        let mut j = i + 1;
        while j < data.len() && matches!(data[j], b' ' | b'\t') {
            j += 1;
        }
        if data[j..].starts_with(b"\r\n") {
            i = j + 2;
            continue;
        }
        if data.get(j) == Some(&b'\n') {
            i = j + 1;
            continue;
        }
        if j == data.len() {
            i = j;
            continue;
        }

        match (hex_value(data.get(i + 1)), hex_value(data.get(i + 2))) {
            (Some(high), Some(low)) => {
                out.push((high << 4) | low);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

pub(crate) const fn hex_pair(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [DIGITS[(byte >> 4) as usize], DIGITS[(byte & 0x0F) as usize]]
}

pub(crate) fn hex_value(byte: Option<&u8>) -> Option<u8> {
    match *byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" Quoted-Printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::parse("x-uuencode"),
            TransferEncoding::Other("x-uuencode".to_string())
        );
        assert_eq!(TransferEncoding::parse("x-uuencode").as_str(), "x-uuencode");
    }

    #[test]
    fn test_decode_unknown_token_fails() {
        let err = TransferEncoding::parse("x-uuencode").decode(b"begin 644 a\r\n");
        assert!(matches!(err, Err(Error::InvalidEncoding(ref token)) if token == "x-uuencode"));
        assert_eq!(TransferEncoding::Binary.decode(b"\x00\x01").unwrap(), b"\x00\x01");
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, b"SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_wraps_lines() {
        let encoded = encode_base64(&[0u8; 120]);
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.lines().all(|line| line.len() <= MAX_LINE_LENGTH));
        assert!(text.contains("\r\n"));
    }

    #[test]
    fn test_base64_decode_is_lenient() {
        assert_eq!(decode_base64(b"SGVs\r\nbG8").unwrap(), b"Hello");
        assert!(decode_base64(b"!!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(encode_quoted_printable("Héllo".as_bytes()), b"H=C3=A9llo");
        assert_eq!(encode_quoted_printable(b"a=b"), b"a=3Db");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable(b"end \r\nnext"), b"end=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_malformed_escape() {
        assert_eq!(decode_quoted_printable(b"50=% off"), b"50=% off");
    }

    #[test]
    fn test_quoted_printable_long_line() {
        let encoded = encode_quoted_printable(&[b'x'; 200]);
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.split("\r\n").all(|line| line.len() <= MAX_LINE_LENGTH));
    }

    proptest! {
        #[test]
        fn quoted_printable_restores_input(data in proptest::collection::vec(any::<u8>(), 0..400)) {
            prop_assert_eq!(decode_quoted_printable(&encode_quoted_printable(&data)), data);
        }
    }
}
