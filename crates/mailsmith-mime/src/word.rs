//! Charset-tagged runs of header text.

use std::fmt;

use crate::charset::{self, Charset};
use crate::error::Result;

/// A run of raw bytes together with the charset they are encoded in.
///
/// Two words are equal when both their bytes and their charsets match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Word {
    buffer: Vec<u8>,
    charset: Charset,
}

impl Word {
    /// Creates a word from bytes in `charset`.
    #[must_use]
    pub fn new(buffer: impl Into<Vec<u8>>, charset: Charset) -> Self {
        Self {
            buffer: buffer.into(),
            charset,
        }
    }

    /// Creates a word from a Rust string, tagged US-ASCII when possible and
    /// UTF-8 otherwise.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let charset = if text.is_ascii() {
            Charset::us_ascii()
        } else {
            Charset::utf_8()
        };
        Self::new(text.as_bytes(), charset)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the charset the bytes are encoded in.
    #[must_use]
    pub const fn charset(&self) -> &Charset {
        &self.charset
    }

    /// Replaces the raw bytes.
    pub fn set_buffer(&mut self, buffer: impl Into<Vec<u8>>) {
        self.buffer = buffer.into();
    }

    /// Replaces the charset tag.
    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    pub(crate) fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns true if the word holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the bytes converted to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conversion`] if no converter exists for the pair.
    pub fn converted_text(&self, dest: &Charset) -> Result<Vec<u8>> {
        charset::convert(&self.buffer, &self.charset, dest)
    }

    /// Returns the text decoded to a Rust string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conversion`] if the charset is unknown.
    pub fn decoded_text(&self) -> Result<String> {
        charset::decode(&self.buffer, &self.charset)
    }

    /// Decodes the text, falling back to lossy UTF-8 for unknown charsets.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        self.decoded_text()
            .unwrap_or_else(|_| String::from_utf8_lossy(&self.buffer).into_owned())
    }

    /// Returns true if the word cannot be written into a header verbatim.
    pub(crate) fn needs_encoding(&self) -> bool {
        !self.buffer.is_ascii() || self.buffer.windows(2).any(|w| w == b"=?")
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_compares_charset() {
        let a = Word::new(b"abc".to_vec(), Charset::new("UTF-8"));
        let b = Word::new(b"abc".to_vec(), Charset::utf_8());
        let c = Word::new(b"abc".to_vec(), Charset::iso_8859_1());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_converted_text() {
        let word = Word::new(b"caf\xE9".to_vec(), Charset::iso_8859_1());
        assert_eq!(word.converted_text(&Charset::utf_8()).unwrap(), "café".as_bytes());
        assert_eq!(word.decoded_text().unwrap(), "café");
    }

    #[test]
    fn test_from_text_tags_charset() {
        assert!(Word::from_text("hello").charset().is_us_ascii());
        assert!(Word::from_text("héllo").charset().is_utf_8());
    }

    #[test]
    fn test_needs_encoding() {
        assert!(!Word::from_text("plain text").needs_encoding());
        assert!(Word::from_text("héllo").needs_encoding());
        assert!(Word::from_text("looks =?like?= a word").needs_encoding());
    }

    #[test]
    fn test_unknown_charset_is_lossy() {
        let word = Word::new(b"abc".to_vec(), Charset::new("x-unknown"));
        assert!(word.decoded_text().is_err());
        assert_eq!(word.to_string_lossy(), "abc");
    }
}
