//! Unstructured header text.
//!
//! A [`Text`] is a sequence of [`Word`]s, each tagged with its own charset.
//! Parsing recognizes RFC 2047 encoded words. Generation writes ASCII words
//! verbatim, turns the rest into encoded words of at most 75 characters and
//! folds lines at whitespace.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::charset::Charset;
use crate::encoding::{LENIENT_BASE64, hex_pair, hex_value};
use crate::error::Result;
use crate::word::Word;

/// Line length limits for generated headers.
pub mod line_length {
    /// Never fold.
    pub const INFINITE: usize = usize::MAX;
    /// Recommended limit from RFC 5322.
    pub const RECOMMENDED: usize = 78;
    /// Hard limit from RFC 5322.
    pub const MAX: usize = 998;
}

const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Options for [`Text::encode_and_fold`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldFlags {
    /// Write every word verbatim, even if it is not ASCII.
    pub force_no_encoding: bool,
}

impl FoldFlags {
    /// Default behaviour: encode words that need it.
    pub const NONE: Self = Self {
        force_no_encoding: false,
    };

    /// Never produce encoded words.
    pub const NO_ENCODING: Self = Self {
        force_no_encoding: true,
    };
}

/// Header text made of charset-tagged words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    words: Vec<Word>,
}

impl Text {
    /// Creates empty text.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates text holding a single word.
    #[must_use]
    pub fn from_word(word: Word) -> Self {
        Self { words: vec![word] }
    }

    /// Returns the words.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Appends a word.
    pub fn push(&mut self, word: Word) {
        self.words.push(word);
    }

    /// Returns true if no word holds any bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(Word::is_empty)
    }

    /// Parses a raw header value.
    ///
    /// Folding is removed and encoded words are decoded to their bytes.
    /// Whitespace between two adjacent encoded words is dropped, and
    /// adjacent encoded words in the same charset are joined. Unencoded
    /// non-ASCII bytes are tagged UTF-8 if valid, else `default_charset`.
    #[must_use]
    pub fn parse(raw: &[u8], default_charset: &Charset) -> Self {
        let unfolded: Vec<u8> = raw
            .iter()
            .copied()
            .filter(|&b| b != b'\r' && b != b'\n')
            .collect();
        let value = trim_wsp(&unfolded);

        let mut text = Self::new();
        let mut plain_start = 0;
        let mut last_encoded: Option<usize> = None;
        let mut i = 0;

        while i + 1 < value.len() {
            if value[i] != b'=' || value[i + 1] != b'?' {
                i += 1;
                continue;
            }
            let Some((word, len)) = parse_encoded_word(&value[i..]) else {
                i += 1;
                continue;
            };

            let plain = &value[plain_start..i];
            let between_encoded = last_encoded.is_some() && plain.iter().all(|&b| is_wsp(b));
            match last_encoded {
                Some(index) if between_encoded && text.words[index].charset() == word.charset() => {
                    text.words[index].extend_from_slice(word.buffer());
                }
                _ => {
                    if !between_encoded && !plain.is_empty() {
                        text.push(plain_word(plain, default_charset));
                    }
                    text.push(word);
                    last_encoded = Some(text.words.len() - 1);
                }
            }
            i += len;
            plain_start = i;
        }

        if plain_start < value.len() {
            text.push(plain_word(&value[plain_start..], default_charset));
        }
        text
    }

    /// Decodes every word and joins them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conversion`] if a word's charset is unknown.
    pub fn decoded(&self) -> Result<String> {
        self.words.iter().map(Word::decoded_text).collect()
    }

    /// Decodes every word, falling back to lossy UTF-8 for unknown charsets.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        self.words.iter().map(Word::to_string_lossy).collect()
    }

    /// Writes the text to `out`, encoding and folding as needed.
    ///
    /// `cur_pos` is the column at which writing starts. Lines are folded
    /// before `max_line_length` wherever whitespace allows. Returns the
    /// column after the last byte written.
    pub fn encode_and_fold(
        &self,
        out: &mut Vec<u8>,
        max_line_length: usize,
        cur_pos: usize,
        flags: FoldFlags,
    ) -> usize {
        let words: Vec<&Word> = self.words.iter().filter(|w| !w.is_empty()).collect();
        let plan = encoding_plan(&words, flags);
        let mut folder = Folder {
            out,
            max: max_line_length,
            pos: cur_pos,
            last_encoded: false,
        };
        for (word, encode) in words.into_iter().zip(plan) {
            if encode {
                folder.encoded(word);
            } else {
                folder.plain(word.buffer());
            }
        }
        folder.pos
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::from_word(Word::from_text(text))
    }
}

impl From<Word> for Text {
    fn from(word: Word) -> Self {
        Self::from_word(word)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

const fn is_wsp(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t')
}

fn trim_wsp(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !is_wsp(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !is_wsp(b)).map_or(start, |i| i + 1);
    &bytes[start..end.max(start)]
}

fn plain_word(bytes: &[u8], default_charset: &Charset) -> Word {
    let charset = if bytes.is_ascii() {
        Charset::us_ascii()
    } else if std::str::from_utf8(bytes).is_ok() {
        Charset::utf_8()
    } else {
        default_charset.clone()
    };
    Word::new(bytes, charset)
}

/// Parses `=?charset?X?payload?=` at the start of `input`.
fn parse_encoded_word(input: &[u8]) -> Option<(Word, usize)> {
    let rest = input.strip_prefix(b"=?")?;
    let charset_len = rest.iter().position(|&b| b == b'?')?;
    let charset = &rest[..charset_len];
    if charset.is_empty() || charset.iter().any(u8::is_ascii_whitespace) {
        return None;
    }

    let rest = &rest[charset_len + 1..];
    if rest.len() < 2 || rest[1] != b'?' {
        return None;
    }
    let kind = rest[0].to_ascii_uppercase();
    let payload_area = &rest[2..];
    let payload_len = payload_area.iter().position(|&b| b == b'?')?;
    if payload_area.get(payload_len + 1) != Some(&b'=') {
        return None;
    }
    let payload = &payload_area[..payload_len];
    if payload.iter().any(u8::is_ascii_whitespace) {
        return None;
    }

    let name = std::str::from_utf8(charset).ok()?;
    // RFC 2231 language suffix
    let name = name.split_once('*').map_or(name, |(name, _)| name);

    let bytes = match kind {
        b'B' => LENIENT_BASE64.decode(payload).ok()?,
        b'Q' => decode_q(payload),
        _ => return None,
    };

    let consumed = 2 + charset_len + 1 + 2 + payload_len + 2;
    Some((Word::new(bytes, Charset::new(name)), consumed))
}

fn decode_q(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut i = 0;
    while i < payload.len() {
        match payload[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => match (hex_value(payload.get(i + 1)), hex_value(payload.get(i + 2))) {
                (Some(high), Some(low)) => {
                    out.push((high << 4) | low);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    out
}

const fn q_is_literal(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'!' | b'*' | b'+' | b'-' | b'/' | b' ')
}

fn q_len(bytes: &[u8]) -> usize {
    bytes.iter().map(|&b| if q_is_literal(b) { 1 } else { 3 }).sum()
}

const fn b_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

fn encode_q(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        if byte == b' ' {
            out.push(b'_');
        } else if q_is_literal(byte) {
            out.push(byte);
        } else {
            out.push(b'=');
            out.extend_from_slice(&hex_pair(byte));
        }
    }
}

/// Decides which words become encoded words.
///
/// A plain word glued to an encoded neighbour without whitespace is encoded
/// too, or the decoder would not find the encoded word's edge.
fn encoding_plan(words: &[&Word], flags: FoldFlags) -> Vec<bool> {
    if flags.force_no_encoding {
        return vec![false; words.len()];
    }

    let mut plan: Vec<bool> = words.iter().map(|w| w.needs_encoding()).collect();
    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..words.len() {
            if plan[i] {
                continue;
            }
            let buffer = words[i].buffer();
            let glued_prev = i > 0 && plan[i - 1] && !buffer.first().is_some_and(|&b| is_wsp(b));
            let glued_next =
                i + 1 < words.len() && plan[i + 1] && !buffer.last().is_some_and(|&b| is_wsp(b));
            if glued_prev || glued_next {
                plan[i] = true;
                changed = true;
            }
        }
    }
    plan
}

/// Byte offsets at which a word may be split without cutting a character.
fn split_points(word: &Word) -> Vec<usize> {
    let buffer = word.buffer();
    if word.charset().is_utf_8() {
        (1..buffer.len())
            .filter(|&i| buffer[i] & 0xC0 != 0x80)
            .chain(std::iter::once(buffer.len()))
            .collect()
    } else if word.charset().is_single_byte() {
        (1..=buffer.len()).collect()
    } else {
        word.charset().char_ends(buffer)
    }
}

struct Folder<'a> {
    out: &'a mut Vec<u8>,
    max: usize,
    pos: usize,
    last_encoded: bool,
}

impl Folder<'_> {
    fn write(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
        match bytes.iter().rposition(|&b| b == b'\n') {
            Some(lf) => self.pos = bytes.len() - lf - 1,
            None => self.pos = self.pos.saturating_add(bytes.len()),
        }
    }

    fn overflows(&self, len: usize) -> bool {
        self.pos.saturating_add(len) > self.max
    }

    fn plain(&mut self, bytes: &[u8]) {
        let mut start = 0;
        while start < bytes.len() {
            let ws_end = start + bytes[start..].iter().take_while(|&&b| is_wsp(b)).count();
            let end = ws_end + bytes[ws_end..].iter().take_while(|&&b| !is_wsp(b)).count();
            let token = &bytes[start..end];
            if ws_end > start && end > ws_end && self.pos > 0 && self.overflows(token.len()) {
                self.out.extend_from_slice(b"\r\n");
                self.pos = 0;
            }
            self.write(token);
            start = end;
        }
        self.last_encoded = false;
    }

    fn encoded(&mut self, word: &Word) {
        let buffer = word.buffer();
        let use_base64 = b_len(buffer.len()) < q_len(buffer);
        let prefix = format!(
            "=?{}?{}?",
            word.charset().name(),
            if use_base64 { 'B' } else { 'Q' }
        );
        let budget = MAX_ENCODED_WORD_LENGTH
            .saturating_sub(prefix.len() + 2)
            .max(4);
        let encoded_len = |piece: &[u8]| {
            if use_base64 {
                b_len(piece.len())
            } else {
                q_len(piece)
            }
        };

        let points = split_points(word);
        let mut start = 0;
        let mut index = 0;
        while start < buffer.len() {
            let mut end = points[index];
            index += 1;
            while index < points.len() && encoded_len(&buffer[start..points[index]]) <= budget {
                end = points[index];
                index += 1;
            }

            let mut piece = prefix.clone().into_bytes();
            if use_base64 {
                piece.extend_from_slice(STANDARD.encode(&buffer[start..end]).as_bytes());
            } else {
                encode_q(&buffer[start..end], &mut piece);
            }
            piece.extend_from_slice(b"?=");
            self.place(&piece);
            start = end;
        }
    }

    /// Writes an encoded word, separating or folding as required.
    fn place(&mut self, piece: &[u8]) {
        if self.last_encoded {
            if self.overflows(piece.len() + 1) {
                self.out.extend_from_slice(b"\r\n ");
                self.pos = 1;
            } else {
                self.write(b" ");
            }
        } else if self.pos > 1 && self.overflows(piece.len()) {
            if let Some(&last) = self.out.last().filter(|&&b| is_wsp(b)) {
                self.out.pop();
                self.out.extend_from_slice(b"\r\n");
                self.out.push(last);
                self.pos = 1;
            }
        }
        self.write(piece);
        self.last_encoded = true;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn generate(text: &Text, max: usize, pos: usize) -> String {
        let mut out = Vec::new();
        text.encode_and_fold(&mut out, max, pos, FoldFlags::NONE);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let text = Text::parse(b"  Hello World ", &Charset::us_ascii());
        assert_eq!(text.words().len(), 1);
        assert_eq!(text.decoded().unwrap(), "Hello World");
    }

    #[test]
    fn test_parse_mixed() {
        let text = Text::parse(b"Hello =?utf-8?Q?W=C3=B6rld?=", &Charset::us_ascii());
        assert_eq!(text.words().len(), 2);
        assert!(text.words()[0].charset().is_us_ascii());
        assert!(text.words()[1].charset().is_utf_8());
        assert_eq!(text.decoded().unwrap(), "Hello Wörld");
    }

    #[test]
    fn test_parse_base64_word() {
        let text = Text::parse(b"=?ISO-8859-1?B?Y2Fm6Q==?=", &Charset::us_ascii());
        assert_eq!(text.words()[0].buffer(), b"caf\xE9");
        assert_eq!(text.decoded().unwrap(), "café");
    }

    #[test]
    fn test_adjacent_encoded_words_join() {
        let text = Text::parse(b"=?utf-8?Q?a?= \r\n =?utf-8?Q?b?=", &Charset::us_ascii());
        assert_eq!(text.words().len(), 1);
        assert_eq!(text.decoded().unwrap(), "ab");
    }

    #[test]
    fn test_split_multibyte_sequence_rejoined() {
        // "é" is C3 A9, split across two encoded words
        let text = Text::parse(b"=?utf-8?Q?=C3?= =?utf-8?Q?=A9?=", &Charset::us_ascii());
        assert_eq!(text.decoded().unwrap(), "é");
    }

    #[test]
    fn test_whitespace_kept_around_plain_text() {
        let text = Text::parse(b"=?utf-8?Q?a?= and =?utf-8?Q?b?=", &Charset::us_ascii());
        assert_eq!(text.decoded().unwrap(), "a and b");
    }

    #[test]
    fn test_invalid_encoded_word_kept_literal() {
        let text = Text::parse(b"=?utf-8?X?abc?= tail", &Charset::us_ascii());
        assert_eq!(text.decoded().unwrap(), "=?utf-8?X?abc?= tail");
    }

    #[test]
    fn test_language_suffix_ignored() {
        let text = Text::parse(b"=?utf-8*en?Q?hi?=", &Charset::us_ascii());
        assert!(text.words()[0].charset().is_utf_8());
    }

    #[test]
    fn test_unencoded_8bit_uses_default_charset() {
        let text = Text::parse(b"caf\xE9", &Charset::iso_8859_1());
        assert_eq!(text.words()[0].charset(), &Charset::iso_8859_1());
        assert_eq!(text.decoded().unwrap(), "café");
    }

    #[test]
    fn test_ascii_written_verbatim() {
        assert_eq!(generate(&Text::from("plain text"), 78, 9), "plain text");
    }

    #[test]
    fn test_non_ascii_encoded() {
        let out = generate(&Text::from("Grüße"), 78, 9);
        assert!(out.starts_with("=?utf-8?"));
        assert_eq!(
            Text::parse(out.as_bytes(), &Charset::us_ascii()).decoded().unwrap(),
            "Grüße"
        );
    }

    #[test]
    fn test_glued_plain_word_is_encoded() {
        let mut text = Text::new();
        text.push(Word::from_text("abc"));
        text.push(Word::from_text("é"));
        let out = generate(&text, 78, 0);
        assert!(!out.contains("abc="));
        assert_eq!(
            Text::parse(out.as_bytes(), &Charset::us_ascii()).decoded().unwrap(),
            "abcé"
        );
    }

    #[test]
    fn test_force_no_encoding() {
        let mut out = Vec::new();
        Text::from("Grüße").encode_and_fold(&mut out, 78, 0, FoldFlags::NO_ENCODING);
        assert_eq!(out, "Grüße".as_bytes());
    }

    #[test]
    fn test_folds_long_ascii() {
        let original = "the quick brown fox jumps over the lazy dog again and again";
        let out = generate(&Text::from(original), 30, 9);
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().skip(1).all(|line| line.starts_with(' ')));
        assert!(lines.iter().skip(1).all(|line| line.len() <= 30));
        assert_eq!(out.replace("\r\n", ""), original);
    }

    #[test]
    fn test_infinite_line_length_never_folds() {
        let original = "word ".repeat(100);
        let out = generate(&Text::from(original.trim()), line_length::INFINITE, 0);
        assert!(!out.contains("\r\n"));
    }

    #[test]
    fn test_encoded_words_bounded() {
        let original = "é".repeat(100);
        let out = generate(&Text::from(original.as_str()), 78, 9);
        for piece in out.split_whitespace() {
            assert!(piece.len() <= MAX_ENCODED_WORD_LENGTH, "{piece}");
        }
        assert_eq!(
            Text::parse(out.as_bytes(), &Charset::us_ascii()).decoded().unwrap(),
            original
        );
    }

    #[test]
    fn test_multibyte_charset_split_at_characters() {
        let original = "日本語のテキスト".repeat(4);
        let sjis = Charset::new("shift_jis");
        let bytes = crate::charset::convert(original.as_bytes(), &Charset::utf_8(), &sjis).unwrap();
        let text = Text::from_word(Word::new(bytes, sjis));

        let out = generate(&text, line_length::RECOMMENDED, 9);
        let pieces: Vec<&str> = out.split_whitespace().collect();
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.len() <= MAX_ENCODED_WORD_LENGTH, "{piece}");
            // Each word decodes on its own, so no character was cut.
            let alone = Text::parse(piece.as_bytes(), &Charset::us_ascii()).decoded().unwrap();
            assert!(!alone.contains('?'), "{piece} -> {alone}");
        }
        assert_eq!(
            Text::parse(out.as_bytes(), &Charset::us_ascii()).decoded().unwrap(),
            original
        );
    }

    proptest! {
        #[test]
        fn encode_then_parse_preserves_text(s in "[a-zA-Z0-9éü日本ß?=_ ]{0,120}", pos in 0usize..40) {
            let mut out = Vec::new();
            Text::from(s.as_str()).encode_and_fold(&mut out, line_length::RECOMMENDED, pos, FoldFlags::NONE);
            let parsed = Text::parse(&out, &Charset::us_ascii());
            // Encoded words carry their edge whitespace, plain text is trimmed
            let expected = if Word::from_text(&s).needs_encoding() { s.as_str() } else { s.trim_matches(' ') };
            prop_assert_eq!(parsed.decoded().unwrap(), expected);
        }
    }
}
