//! Character sets and byte-level transcoding.
//!
//! Conversion runs through a [`TranscoderEngine`]. The default engine is
//! backed by `encoding_rs` and understands every WHATWG encoding label.
//!
//! Conversion is lossy: each maximal run of input that cannot be decoded
//! from the source charset, or cannot be represented in the destination,
//! is replaced by a single `?`.
//!
//! The converter reads its input in fixed-size chunks and never buffers
//! more than one chunk plus an incomplete trailing sequence. A sequence that
//! fails to convert and runs up to the end of the buffered input may be a
//! character split across chunks, so it is retried once the next chunk has
//! been appended. It is declared invalid when it fails with input after it,
//! or when the input is exhausted.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Read, Write};

use encoding_rs::{DecoderResult, Encoder, EncoderResult, Encoding};

use crate::error::{Error, Result};

/// Default number of input bytes read per streaming step.
pub const CHUNK_SIZE: usize = 4096;

const PLACEHOLDER: u8 = b'?';

/// Decoded bytes per step when a transcode call starts; doubles up to
/// [`MAX_PIECE`] while the input keeps converting cleanly.
const MIN_PIECE: usize = 64;
const MAX_PIECE: usize = 4096;

/// A named byte encoding.
///
/// Names compare case-insensitively, so `UTF-8` and `utf-8` are the same
/// charset.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Charset {
    name: String,
}

impl Charset {
    /// Creates a charset from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.len() == name.len() {
            Self { name }
        } else {
            Self {
                name: trimmed.to_string(),
            }
        }
    }

    /// US-ASCII, the fallback for untagged text.
    #[must_use]
    pub fn us_ascii() -> Self {
        Self::new("us-ascii")
    }

    /// UTF-8.
    #[must_use]
    pub fn utf_8() -> Self {
        Self::new("utf-8")
    }

    /// ISO-8859-1.
    #[must_use]
    pub fn iso_8859_1() -> Self {
        Self::new("iso-8859-1")
    }

    /// Returns the charset name as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true for US-ASCII and its common aliases.
    #[must_use]
    pub fn is_us_ascii(&self) -> bool {
        ["us-ascii", "ascii", "us"]
            .iter()
            .any(|alias| self.name.eq_ignore_ascii_case(alias))
    }

    /// Returns true if the charset is some spelling of UTF-8.
    #[must_use]
    pub fn is_utf_8(&self) -> bool {
        self.name.eq_ignore_ascii_case("utf-8") || self.name.eq_ignore_ascii_case("utf8")
    }

    /// Derives the charset from the process locale.
    ///
    /// Reads `LC_ALL`, `LC_CTYPE` and `LANG` in that order.
    #[must_use]
    pub fn from_locale() -> Self {
        let vars: Vec<String> = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .collect();
        Self::from_locale_vars(vars.iter().map(String::as_str))
    }

    /// Derives the charset from locale strings such as `en_US.UTF-8@euro`.
    ///
    /// The first non-empty value wins. Locales without a codeset (`C`,
    /// `POSIX`, `en_US`) map to US-ASCII.
    #[must_use]
    pub fn from_locale_vars<'a, I>(vars: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(locale) = vars.into_iter().map(str::trim).find(|v| !v.is_empty()) else {
            return Self::us_ascii();
        };

        let codeset = locale
            .split_once('.')
            .map(|(_, rest)| rest.split_once('@').map_or(rest, |(codeset, _)| codeset));

        match codeset {
            Some(codeset) if !codeset.is_empty() => {
                let lower = codeset.to_ascii_lowercase();
                if lower == "utf8" {
                    Self::utf_8()
                } else {
                    Self::new(lower)
                }
            }
            _ => Self::us_ascii(),
        }
    }

    fn encoding(&self) -> Option<&'static Encoding> {
        Encoding::for_label_no_replacement(self.name.as_bytes())
    }

    /// Returns true if every byte of this charset's text is a whole character.
    pub(crate) fn is_single_byte(&self) -> bool {
        self.is_us_ascii() || self.encoding().is_some_and(Encoding::is_single_byte)
    }

    /// Byte offsets just past each character of `bytes`, ending with
    /// `bytes.len()`.
    ///
    /// Bytes that do not decode stand alone, as does every byte of a
    /// charset `encoding_rs` does not know.
    pub(crate) fn char_ends(&self, bytes: &[u8]) -> Vec<usize> {
        let Some(encoding) = self.encoding() else {
            return (1..=bytes.len()).collect();
        };
        let mut decoder = encoding.new_decoder_without_bom_handling();
        let mut scratch = String::with_capacity(16);
        let mut ends = Vec::with_capacity(bytes.len());
        for (i, byte) in bytes.iter().enumerate() {
            scratch.clear();
            let last = i + 1 == bytes.len();
            let (result, _) = decoder.decode_to_string_without_replacement(
                std::slice::from_ref(byte),
                &mut scratch,
                last,
            );
            match result {
                DecoderResult::InputEmpty if scratch.is_empty() => {}
                DecoderResult::InputEmpty
                | DecoderResult::OutputFull
                | DecoderResult::Malformed(..) => ends.push(i + 1),
            }
        }
        if ends.last() != Some(&bytes.len()) {
            ends.push(bytes.len());
        }
        ends
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::us_ascii()
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Hash for Charset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.name.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Charset {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Outcome of one transcoding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoded {
    /// Input bytes converted and written to the output.
    pub consumed: usize,
    /// Length of the sequence at `consumed` that could not be converted.
    pub invalid: Option<usize>,
}

/// Opens transcoding sessions for charset pairs.
pub trait TranscoderEngine {
    /// Session type produced by this engine.
    type Session: TranscodeSession;

    /// Opens a session converting `source` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if the pair is not supported.
    fn open(&self, source: &Charset, dest: &Charset) -> Result<Self::Session>;
}

/// An open conversion between two charsets. Dropping the session closes it.
pub trait TranscodeSession {
    /// Converts as much of `input` as possible, appending to `output`.
    ///
    /// Stops at the first sequence that cannot be converted. When
    /// `invalid` is `None` the whole input must have been consumed.
    fn transcode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Transcoded;
}

/// Transcoder backed by `encoding_rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingRsEngine;

impl TranscoderEngine for EncodingRsEngine {
    type Session = EncodingRsSession;

    fn open(&self, source: &Charset, dest: &Charset) -> Result<EncodingRsSession> {
        let unsupported = || Error::Conversion {
            from: source.name().to_string(),
            to: dest.name().to_string(),
        };
        let from = source.encoding().ok_or_else(unsupported)?;
        let to = dest.encoding().ok_or_else(unsupported)?;
        tracing::trace!(from = from.name(), to = to.name(), "opened transcoder");
        Ok(EncodingRsSession { from, to })
    }
}

/// Session of [`EncodingRsEngine`].
///
/// Every call decodes `input` from a fresh decoder, in pieces that start
/// small and grow while the text converts cleanly, so a call costs time
/// proportional to what it consumes.
#[derive(Debug)]
pub struct EncodingRsSession {
    from: &'static Encoding,
    to: &'static Encoding,
}

impl TranscodeSession for EncodingRsSession {
    fn transcode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Transcoded {
        let mut decoder = self.from.new_decoder_without_bom_handling();
        let mut encoder = self.to.new_encoder();
        let mut text = String::new();
        let mut piece = MIN_PIECE;
        let mut consumed = 0;

        loop {
            let rest = &input[consumed..];
            text.clear();
            text.reserve(piece);
            let (result, read) = decoder.decode_to_string_without_replacement(rest, &mut text, true);
            let (decoded, malformed) = match result {
                DecoderResult::Malformed(bad, after) => {
                    let bad = usize::from(bad);
                    (read.saturating_sub(bad + usize::from(after)), Some(bad.max(1)))
                }
                DecoderResult::InputEmpty | DecoderResult::OutputFull => (read, None),
            };

            if let Some(at) = encode_piece(self.to, &mut encoder, &text, output) {
                finish_encoder(&mut encoder, output);
                let char_index = text[..at].chars().count();
                let (start, end) = source_span(self.from, &rest[..decoded], char_index);
                return Transcoded {
                    consumed: consumed + start,
                    invalid: Some((end - start).max(1)),
                };
            }
            consumed += decoded;

            match result {
                DecoderResult::OutputFull if read > 0 => piece = (piece * 2).min(MAX_PIECE),
                DecoderResult::OutputFull => {
                    finish_encoder(&mut encoder, output);
                    return Transcoded {
                        consumed,
                        invalid: Some(1),
                    };
                }
                DecoderResult::InputEmpty | DecoderResult::Malformed(..) => {
                    finish_encoder(&mut encoder, output);
                    return Transcoded {
                        consumed,
                        invalid: malformed,
                    };
                }
            }
        }
    }
}

/// Appends `text` in the `to` encoding. Returns the byte offset in `text`
/// of the first character the destination cannot represent.
fn encode_piece(
    to: &'static Encoding,
    encoder: &mut Encoder,
    text: &str,
    output: &mut Vec<u8>,
) -> Option<usize> {
    if to == encoding_rs::UTF_8 {
        output.extend_from_slice(text.as_bytes());
        return None;
    }
    // encoding_rs only encodes UTF-16 as UTF-8, so those two are written here.
    if to == encoding_rs::UTF_16LE {
        output.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        return None;
    }
    if to == encoding_rs::UTF_16BE {
        output.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
        return None;
    }

    let mut offset = 0;
    loop {
        let remaining = &text[offset..];
        let capacity = encoder
            .max_buffer_length_from_utf8_without_replacement(remaining.len())
            .unwrap_or_else(|| remaining.len().saturating_mul(4));
        output.reserve(capacity);
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(remaining, output, false);
        match result {
            EncoderResult::InputEmpty => return None,
            EncoderResult::OutputFull => offset += read,
            EncoderResult::Unmappable(c) => {
                return Some((offset + read).saturating_sub(c.len_utf8()));
            }
        }
    }
}

/// Ends the encoder's output, returning stateful encodings to their
/// initial shift state.
fn finish_encoder(encoder: &mut Encoder, output: &mut Vec<u8>) {
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(0)
        .unwrap_or(8);
    output.reserve(capacity);
    let (result, _) = encoder.encode_from_utf8_to_vec_without_replacement("", output, true);
    debug_assert_eq!(result, EncoderResult::InputEmpty);
}

/// Finds the source bytes that decode to the character at `char_index`.
///
/// A byte that fails to decode ends the search: it is reported as the
/// offending span.
fn source_span(encoding: &'static Encoding, input: &[u8], char_index: usize) -> (usize, usize) {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut scratch = String::with_capacity(16);
    let mut chars = 0;
    let mut start = 0;
    for (i, byte) in input.iter().enumerate() {
        scratch.clear();
        let last = i + 1 == input.len();
        let (result, _) = decoder.decode_to_string_without_replacement(
            std::slice::from_ref(byte),
            &mut scratch,
            last,
        );
        match result {
            DecoderResult::InputEmpty => {}
            DecoderResult::OutputFull | DecoderResult::Malformed(..) => return (start, i + 1),
        }
        let produced = scratch.chars().count();
        if produced > 0 {
            if chars + produced > char_index {
                return (start, i + 1);
            }
            chars += produced;
            start = i + 1;
        }
    }
    (start, input.len())
}

/// Charset converter over a [`TranscoderEngine`].
#[derive(Debug, Clone)]
pub struct Converter<E = EncodingRsEngine> {
    engine: E,
    chunk_size: usize,
}

impl Converter {
    /// Creates a converter using the `encoding_rs` engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engine: EncodingRsEngine,
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TranscoderEngine> Converter<E> {
    /// Creates a converter over a custom engine.
    pub const fn with_engine(engine: E) -> Self {
        Self {
            engine,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Sets the number of bytes read per streaming step.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Converts a whole buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if the charset pair is unsupported.
    pub fn convert(&self, input: &[u8], source: &Charset, dest: &Charset) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len());
        self.pump(input, &mut output, source, dest)?;
        Ok(output)
    }

    /// Converts `input` to `output` chunk by chunk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] if the charset pair is unsupported and
    /// [`Error::Io`] if reading or writing fails.
    pub fn convert_stream<R: Read, W: Write>(
        &self,
        input: R,
        output: W,
        source: &Charset,
        dest: &Charset,
    ) -> Result<()> {
        self.pump(input, output, source, dest)
    }

    fn pump<R: Read, W: Write>(
        &self,
        mut input: R,
        mut output: W,
        source: &Charset,
        dest: &Charset,
    ) -> Result<()> {
        let mut session = self.engine.open(source, dest)?;
        let mut chunk = vec![0u8; self.chunk_size];
        // Unconverted input is `pending[start..]`.
        let mut pending: Vec<u8> = Vec::with_capacity(self.chunk_size.saturating_mul(2));
        let mut start = 0;
        let mut converted = Vec::new();
        let mut eof = false;
        let mut need_input = true;
        let mut in_invalid_run = false;

        loop {
            if need_input && !eof {
                let read = read_chunk(&mut input, &mut chunk)?;
                if read == 0 {
                    eof = true;
                } else {
                    pending.drain(..start);
                    start = 0;
                    pending.extend_from_slice(&chunk[..read]);
                }
            }
            let window = &pending[start..];
            if window.is_empty() {
                if eof {
                    break;
                }
                need_input = true;
                continue;
            }

            converted.clear();
            let step = session.transcode(window, &mut converted);
            output.write_all(&converted)?;
            let consumed = step.consumed.min(window.len());
            if consumed > 0 {
                in_invalid_run = false;
            }
            start += consumed;
            let remaining = pending.len() - start;

            match step.invalid {
                None if consumed == 0 => {
                    return Err(Error::Stalled(source.name().to_string()));
                }
                None => need_input = false,
                // Possibly a character cut by the chunk edge: retry with more input.
                Some(len) if len >= remaining && !eof => need_input = true,
                Some(len) => {
                    if !in_invalid_run {
                        output.write_all(&[PLACEHOLDER])?;
                        in_invalid_run = true;
                    }
                    start += len.min(remaining);
                    need_input = false;
                }
            }
        }

        output.flush()?;
        Ok(())
    }
}

fn read_chunk<R: Read>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match input.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

/// Converts a buffer from `source` to `dest` with the default engine.
///
/// # Errors
///
/// Returns [`Error::Conversion`] if the charset pair is unsupported.
pub fn convert(input: &[u8], source: &Charset, dest: &Charset) -> Result<Vec<u8>> {
    if source == dest {
        return Ok(input.to_vec());
    }
    Converter::new().convert(input, source, dest)
}

/// Streams `input` into `output`, converting from `source` to `dest`.
///
/// # Errors
///
/// Returns [`Error::Conversion`] if the charset pair is unsupported and
/// [`Error::Io`] if reading or writing fails.
pub fn convert_stream<R: Read, W: Write>(
    input: R,
    output: W,
    source: &Charset,
    dest: &Charset,
) -> Result<()> {
    Converter::new().convert_stream(input, output, source, dest)
}

/// Decodes bytes in `charset` to a Rust string.
///
/// # Errors
///
/// Returns [`Error::Conversion`] if the charset is unknown.
pub fn decode(input: &[u8], charset: &Charset) -> Result<String> {
    if input.is_ascii() && (charset.is_us_ascii() || charset.is_utf_8()) {
        return Ok(String::from_utf8(input.to_vec())?);
    }
    let bytes = Converter::new().convert(input, charset, &Charset::utf_8())?;
    Ok(String::from_utf8(bytes)?)
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
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::rc::Rc;

    #[test]
    fn test_charset_equality_ignores_case() {
        assert_eq!(Charset::new("UTF-8"), Charset::utf_8());
        assert_ne!(Charset::new("utf-16"), Charset::utf_8());

        let mut set = HashSet::new();
        set.insert(Charset::new("ISO-8859-1"));
        assert!(set.contains(&Charset::iso_8859_1()));
    }

    #[test]
    fn test_charset_default_is_us_ascii() {
        assert!(Charset::default().is_us_ascii());
    }

    #[test]
    fn test_from_locale_vars() {
        assert_eq!(Charset::from_locale_vars(["en_US.UTF-8"]), Charset::utf_8());
        assert_eq!(Charset::from_locale_vars(["C"]), Charset::us_ascii());
        assert_eq!(
            Charset::from_locale_vars(["", "de_DE.ISO-8859-15@euro"]),
            Charset::new("iso-8859-15")
        );
        assert_eq!(Charset::from_locale_vars(["fr_FR.utf8"]), Charset::utf_8());
        assert_eq!(Charset::from_locale_vars(Vec::<&str>::new()), Charset::us_ascii());
    }

    #[test]
    fn test_convert_utf8_to_latin1() {
        let out = convert("café".as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"caf\xE9");
    }

    #[test]
    fn test_convert_latin1_to_utf8() {
        let out = convert(b"na\xEFve", &Charset::iso_8859_1(), &Charset::utf_8()).unwrap();
        assert_eq!(out, "naïve".as_bytes());
    }

    #[test]
    fn test_unsupported_pair() {
        let err = convert(b"abc", &Charset::new("x-no-such-charset"), &Charset::utf_8());
        assert!(matches!(err, Err(Error::Conversion { .. })));
    }

    #[test]
    fn test_invalid_input_becomes_placeholder() {
        let out = convert(b"ab\xFFcd", &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"ab?cd");
    }

    #[test]
    fn test_invalid_run_yields_single_placeholder() {
        let out = convert(b"ab\xFF\xFE\xFDcd", &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"ab?cd");
    }

    #[test]
    fn test_separate_runs_get_separate_placeholders() {
        let out = convert(b"\xFFa\xFF", &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"?a?");
    }

    #[test]
    fn test_unmappable_character() {
        let out = convert("a日b".as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"a?b");
    }

    #[test]
    fn test_long_unmappable_run() {
        let input = "日".repeat(8000);
        let out = convert(input.as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"?");

        let input = "é日".repeat(8000);
        let out = convert(input.as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"\xE9?".repeat(8000));
    }

    #[test]
    fn test_truncated_sequence_at_end() {
        let out = convert(b"ok\xE6\x97", &Charset::utf_8(), &Charset::iso_8859_1()).unwrap();
        assert_eq!(out, b"ok?");
    }

    #[test]
    fn test_stream_keeps_split_sequences() {
        let text = "Grüße aus 日本 🎉 und Köln";
        let mut out = Vec::new();
        Converter::new()
            .chunk_size(3)
            .convert_stream(
                Cursor::new(text.as_bytes()),
                &mut out,
                &Charset::utf_8(),
                &Charset::utf_8(),
            )
            .unwrap();
        assert_eq!(out, text.as_bytes());
    }

    #[test]
    fn test_stream_to_shift_jis_across_chunks() {
        let text = "東京の天気は晴れ";
        let mut sjis = Vec::new();
        Converter::new()
            .chunk_size(1)
            .convert_stream(
                Cursor::new(text.as_bytes()),
                &mut sjis,
                &Charset::utf_8(),
                &Charset::new("shift_jis"),
            )
            .unwrap();
        assert_eq!(decode(&sjis, &Charset::new("Shift_JIS")).unwrap(), text);
    }

    #[test]
    fn test_stream_to_utf16() {
        let mut out = Vec::new();
        convert_stream(
            Cursor::new(b"hi".to_vec()),
            &mut out,
            &Charset::us_ascii(),
            &Charset::new("utf-16le"),
        )
        .unwrap();
        assert_eq!(out, b"h\0i\0");
    }

    #[test]
    fn test_source_span_stops_at_undecodable_byte() {
        assert_eq!(source_span(encoding_rs::UTF_8, "aé日".as_bytes(), 2), (3, 6));
        assert_eq!(source_span(encoding_rs::UTF_8, b"\xFFab", 1), (0, 1));
    }

    #[test]
    fn test_char_ends() {
        let sjis = convert("日本a".as_bytes(), &Charset::utf_8(), &Charset::new("shift_jis")).unwrap();
        assert_eq!(Charset::new("shift_jis").char_ends(&sjis), [2, 4, 5]);
        assert_eq!(Charset::utf_8().char_ends("aé".as_bytes()), [1, 3]);
        assert_eq!(Charset::new("x-unknown").char_ends(b"ab"), [1, 2]);
        // A lone lead byte at the end still closes the list.
        assert_eq!(Charset::new("shift_jis").char_ends(b"a\x93"), [1, 2]);
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(b"plain", &Charset::us_ascii()).unwrap(), "plain");
        assert_eq!(decode(b"\xE9t\xE9", &Charset::iso_8859_1()).unwrap(), "été");
    }

    struct CountingEngine;

    struct CountingSession;

    impl TranscoderEngine for CountingEngine {
        type Session = CountingSession;

        fn open(&self, _source: &Charset, _dest: &Charset) -> Result<CountingSession> {
            Ok(CountingSession)
        }
    }

    impl TranscodeSession for CountingSession {
        fn transcode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Transcoded {
            match input.iter().position(|&b| b == b'!') {
                Some(at) => {
                    output.extend_from_slice(&input[..at]);
                    Transcoded {
                        consumed: at,
                        invalid: Some(1),
                    }
                }
                None => {
                    output.extend_from_slice(input);
                    Transcoded {
                        consumed: input.len(),
                        invalid: None,
                    }
                }
            }
        }
    }

    #[test]
    fn test_custom_engine() {
        let converter = Converter::with_engine(CountingEngine).chunk_size(2);
        let out = converter
            .convert(b"ab!!cd!", &Charset::utf_8(), &Charset::utf_8())
            .unwrap();
        assert_eq!(out, b"ab?cd?");
    }

    /// Remembers the widest input handed to the wrapped session.
    struct Widest<E> {
        inner: E,
        widest: Rc<Cell<usize>>,
    }

    struct WidestSession<S> {
        inner: S,
        widest: Rc<Cell<usize>>,
    }

    impl<E: TranscoderEngine> TranscoderEngine for Widest<E> {
        type Session = WidestSession<E::Session>;

        fn open(&self, source: &Charset, dest: &Charset) -> Result<Self::Session> {
            Ok(WidestSession {
                inner: self.inner.open(source, dest)?,
                widest: Rc::clone(&self.widest),
            })
        }
    }

    impl<S: TranscodeSession> TranscodeSession for WidestSession<S> {
        fn transcode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Transcoded {
            self.widest.set(self.widest.get().max(input.len()));
            self.inner.transcode(input, output)
        }
    }

    #[test]
    fn test_stream_buffers_at_most_a_chunk() {
        let widest = Rc::new(Cell::new(0));
        let converter = Converter::with_engine(Widest {
            inner: EncodingRsEngine,
            widest: Rc::clone(&widest),
        })
        .chunk_size(256);

        let input = "a日".repeat(50_000);
        let mut out = Vec::new();
        converter
            .convert_stream(
                Cursor::new(input.as_bytes()),
                &mut out,
                &Charset::utf_8(),
                &Charset::iso_8859_1(),
            )
            .unwrap();

        assert_eq!(out, "a?".repeat(50_000).as_bytes());
        assert!(widest.get() <= 256 + 4, "window grew to {}", widest.get());
    }

    #[test]
    fn test_one_shot_reads_in_chunks() {
        let widest = Rc::new(Cell::new(0));
        let converter = Converter::with_engine(Widest {
            inner: EncodingRsEngine,
            widest: Rc::clone(&widest),
        });
        let input = "x".repeat(3 * CHUNK_SIZE);
        let out = converter
            .convert(input.as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1())
            .unwrap();
        assert_eq!(out, input.as_bytes());
        assert!(widest.get() <= CHUNK_SIZE);
    }
}
