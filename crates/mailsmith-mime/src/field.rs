//! Header fields and their typed values.

use std::collections::HashMap;

use crate::charset::Charset;
use crate::content_type::ContentType;
use crate::datetime::DateTime;
use crate::encoding::TransferEncoding;
use crate::error::{Error, Result};
use crate::mailbox::MailboxList;
use crate::relay::Relay;
use crate::text::{FoldFlags, Text};

/// The kind of value a field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Comma-separated mailboxes.
    MailboxList,
    /// A Content-Transfer-Encoding token.
    ContentEncoding,
    /// A media type with parameters.
    ContentType,
    /// A `Received:` trace.
    Relay,
    /// An RFC 5322 date.
    Date,
    /// Unstructured text.
    Text,
}

/// Typed value of a header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Comma-separated mailboxes.
    MailboxList(MailboxList),
    /// A Content-Transfer-Encoding token.
    ContentEncoding(TransferEncoding),
    /// A media type with parameters.
    ContentType(ContentType),
    /// A `Received:` trace.
    Relay(Relay),
    /// An RFC 5322 date.
    Date(DateTime),
    /// Unstructured text.
    Text(Text),
}

impl FieldValue {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::MailboxList(_) => FieldKind::MailboxList,
            Self::ContentEncoding(_) => FieldKind::ContentEncoding,
            Self::ContentType(_) => FieldKind::ContentType,
            Self::Relay(_) => FieldKind::Relay,
            Self::Date(_) => FieldKind::Date,
            Self::Text(_) => FieldKind::Text,
        }
    }
}

const STANDARD_FIELDS: &[(&str, FieldKind)] = &[
    ("from", FieldKind::MailboxList),
    ("sender", FieldKind::MailboxList),
    ("reply-to", FieldKind::MailboxList),
    ("to", FieldKind::MailboxList),
    ("cc", FieldKind::MailboxList),
    ("bcc", FieldKind::MailboxList),
    ("return-path", FieldKind::MailboxList),
    ("delivered-to", FieldKind::MailboxList),
    ("disposition-notification-to", FieldKind::MailboxList),
    ("resent-from", FieldKind::MailboxList),
    ("resent-sender", FieldKind::MailboxList),
    ("resent-to", FieldKind::MailboxList),
    ("resent-cc", FieldKind::MailboxList),
    ("resent-bcc", FieldKind::MailboxList),
    ("content-transfer-encoding", FieldKind::ContentEncoding),
    ("content-type", FieldKind::ContentType),
    ("received", FieldKind::Relay),
    ("date", FieldKind::Date),
    ("resent-date", FieldKind::Date),
];

/// Maps field names to value kinds. Unregistered names are text.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    kinds: HashMap<String, FieldKind>,
}

impl FieldRegistry {
    /// A registry with no entries: every field parses as text.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registers (or overrides) the kind for a field name.
    pub fn register(&mut self, name: &str, kind: FieldKind) {
        self.kinds.insert(name.to_ascii_lowercase(), kind);
    }

    /// Returns the kind for a field name.
    #[must_use]
    pub fn kind_for(&self, name: &str) -> FieldKind {
        self.kinds
            .get(&name.to_ascii_lowercase())
            .copied()
            .unwrap_or(FieldKind::Text)
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for &(name, kind) in STANDARD_FIELDS {
            registry.register(name, kind);
        }
        registry
    }
}

/// A named header field.
///
/// A field whose value could not be understood keeps its raw bytes and
/// writes them back unchanged. Equality ignores name case and folding.
#[derive(Debug, Clone)]
pub struct HeaderField {
    name: String,
    value: FieldValue,
    raw: Vec<u8>,
    parsed: bool,
}

impl HeaderField {
    /// Creates a field from a typed value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            raw: Vec::new(),
            parsed: true,
        }
    }

    /// Creates an unstructured text field.
    #[must_use]
    pub fn text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, FieldValue::Text(Text::from(text)))
    }

    /// Parses the value in `buffer[start..end]` as `kind`.
    #[must_use]
    pub fn parse(
        name: impl Into<String>,
        kind: FieldKind,
        buffer: &[u8],
        start: usize,
        end: usize,
        default_charset: &Charset,
    ) -> Self {
        let name = name.into();
        let end = end.min(buffer.len());
        let raw = &buffer[start.min(end)..end];
        let blank = raw.iter().all(u8::is_ascii_whitespace);

        let (value, parsed) = match kind {
            FieldKind::MailboxList => {
                let list = MailboxList::parse(raw, default_charset);
                let parsed = blank || !list.is_empty();
                (FieldValue::MailboxList(list), parsed)
            }
            FieldKind::ContentEncoding => {
                let unfolded = String::from_utf8_lossy(raw);
                let token = unfolded.split(';').next().unwrap_or_default().trim();
                (
                    FieldValue::ContentEncoding(TransferEncoding::parse(token)),
                    !token.is_empty(),
                )
            }
            FieldKind::ContentType => {
                let unfolded: String = String::from_utf8_lossy(raw)
                    .chars()
                    .filter(|&c| c != '\r' && c != '\n')
                    .collect();
                match ContentType::parse(&unfolded) {
                    Ok(content_type) => (FieldValue::ContentType(content_type), true),
                    Err(e) => {
                        tracing::debug!(%e, "content type kept raw");
                        (FieldValue::ContentType(ContentType::default()), false)
                    }
                }
            }
            FieldKind::Relay => {
                let relay = Relay::parse(raw);
                let parsed = relay.is_parsed();
                (FieldValue::Relay(relay), parsed)
            }
            FieldKind::Date => {
                let date = DateTime::parse(raw);
                let parsed = date.is_parsed();
                (FieldValue::Date(date), parsed)
            }
            FieldKind::Text => (FieldValue::Text(Text::parse(raw, default_charset)), true),
        };

        if !parsed {
            tracing::trace!(field = %name, "field value kept verbatim");
        }

        Self {
            name,
            value,
            raw: raw.to_vec(),
            parsed,
        }
    }

    /// Returns the field name as written.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the field has the given name, ignoring case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the kind of the typed value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    /// Returns the typed value.
    #[must_use]
    pub const fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Replaces the value. The field is regenerated from it from now on.
    pub fn set_value(&mut self, value: FieldValue) {
        self.value = value;
        self.raw.clear();
        self.parsed = true;
    }

    /// Returns the raw bytes the field was parsed from.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the raw value with folding removed.
    #[must_use]
    pub fn raw_text(&self) -> String {
        let unfolded: Vec<u8> = self
            .raw
            .iter()
            .copied()
            .filter(|&b| b != b'\r' && b != b'\n')
            .collect();
        String::from_utf8_lossy(&unfolded).trim().to_string()
    }

    /// Returns false if the value could not be understood.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        self.parsed
    }

    fn kind_error(&self, expected: &'static str) -> Error {
        Error::FieldKind {
            name: self.name.clone(),
            expected,
        }
    }

    /// Returns the mailbox list value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldKind`] if the field holds another kind.
    pub fn as_mailbox_list(&self) -> Result<&MailboxList> {
        match &self.value {
            FieldValue::MailboxList(list) => Ok(list),
            _ => Err(self.kind_error("mailbox list")),
        }
    }

    /// Returns the transfer encoding value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldKind`] if the field holds another kind.
    pub fn as_encoding(&self) -> Result<&TransferEncoding> {
        match &self.value {
            FieldValue::ContentEncoding(encoding) => Ok(encoding),
            _ => Err(self.kind_error("content encoding")),
        }
    }

    /// Returns the content type value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldKind`] if the field holds another kind.
    pub fn as_content_type(&self) -> Result<&ContentType> {
        match &self.value {
            FieldValue::ContentType(content_type) => Ok(content_type),
            _ => Err(self.kind_error("content type")),
        }
    }

    /// Returns the relay value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldKind`] if the field holds another kind.
    pub fn as_relay(&self) -> Result<&Relay> {
        match &self.value {
            FieldValue::Relay(relay) => Ok(relay),
            _ => Err(self.kind_error("relay")),
        }
    }

    /// Returns the date value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldKind`] if the field holds another kind.
    pub fn as_date(&self) -> Result<&DateTime> {
        match &self.value {
            FieldValue::Date(date) => Ok(date),
            _ => Err(self.kind_error("date")),
        }
    }

    /// Returns the text value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldKind`] if the field holds another kind.
    pub fn as_text(&self) -> Result<&Text> {
        match &self.value {
            FieldValue::Text(text) => Ok(text),
            _ => Err(self.kind_error("text")),
        }
    }

    /// Writes `Name: value` without the trailing line break. Returns the
    /// column after the last byte written.
    pub fn generate(&self, out: &mut Vec<u8>, max_line_length: usize, cur_pos: usize) -> usize {
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(b": ");
        let pos = cur_pos + self.name.len() + 2;

        if !self.parsed {
            return write_raw(out, &self.raw, pos);
        }

        match &self.value {
            FieldValue::MailboxList(list) => list.generate(out, max_line_length, pos),
            FieldValue::ContentEncoding(encoding) => {
                out.extend_from_slice(encoding.as_str().as_bytes());
                pos + encoding.as_str().len()
            }
            FieldValue::ContentType(content_type) => {
                content_type.generate(out, max_line_length, pos)
            }
            FieldValue::Relay(relay) => relay.generate(out, max_line_length, pos),
            FieldValue::Date(date) => {
                let text = date.generate();
                out.extend_from_slice(text.as_bytes());
                pos + text.len()
            }
            FieldValue::Text(text) => text.encode_and_fold(out, max_line_length, pos, FoldFlags::NONE),
        }
    }
}

impl PartialEq for HeaderField {
    fn eq(&self, other: &Self) -> bool {
        self.is_named(&other.name)
            && self.parsed == other.parsed
            && if self.parsed {
                self.value == other.value
            } else {
                self.raw_text() == other.raw_text()
            }
    }
}

impl Eq for HeaderField {}

/// Writes raw folded bytes, normalizing bare LF to CRLF.
fn write_raw(out: &mut Vec<u8>, raw: &[u8], cur_pos: usize) -> usize {
    let mut pos = cur_pos;
    for (i, &b) in raw.iter().enumerate() {
        match b {
            b'\n' => {
                if i == 0 || raw[i - 1] != b'\r' {
                    out.push(b'\r');
                }
                out.push(b'\n');
                pos = 0;
            }
            _ => {
                out.push(b);
                pos += 1;
            }
        }
    }
    pos
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::text::line_length;

    fn parse(name: &str, value: &str) -> HeaderField {
        let registry = FieldRegistry::default();
        HeaderField::parse(
            name,
            registry.kind_for(name),
            value.as_bytes(),
            0,
            value.len(),
            &Charset::us_ascii(),
        )
    }

    fn render(field: &HeaderField) -> String {
        let mut out = Vec::new();
        field.generate(&mut out, line_length::RECOMMENDED, 0);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        let registry = FieldRegistry::default();
        assert_eq!(registry.kind_for("FROM"), FieldKind::MailboxList);
        assert_eq!(registry.kind_for("Content-Type"), FieldKind::ContentType);
        assert_eq!(registry.kind_for("X-Mailer"), FieldKind::Text);
    }

    #[test]
    fn test_registry_extension() {
        let mut registry = FieldRegistry::empty();
        assert_eq!(registry.kind_for("to"), FieldKind::Text);
        registry.register("X-Original-To", FieldKind::MailboxList);
        assert_eq!(registry.kind_for("x-original-to"), FieldKind::MailboxList);
    }

    #[test]
    fn test_typed_accessors() {
        let field = parse("To", "a@example.com, b@example.com");
        assert_eq!(field.as_mailbox_list().unwrap().len(), 2);
        assert!(matches!(field.as_text(), Err(Error::FieldKind { .. })));

        let field = parse("Content-Transfer-Encoding", " Base64 ");
        assert_eq!(field.as_encoding().unwrap(), &TransferEncoding::Base64);
    }

    #[test]
    fn test_subrange_parse() {
        let buffer = b"Subject: hello world\r\n";
        let field = HeaderField::parse(
            "Subject",
            FieldKind::Text,
            buffer,
            9,
            20,
            &Charset::us_ascii(),
        );
        assert_eq!(field.as_text().unwrap().to_string(), "hello world");
    }

    #[test]
    fn test_malformed_value_round_trips_raw() {
        let field = parse("Content-Type", "garbage");
        assert!(!field.is_parsed());
        assert_eq!(render(&field), "Content-Type: garbage");

        let field = parse("Received", "from a by b");
        assert!(!field.is_parsed());
        assert_eq!(render(&field), "Received: from a by b");
    }

    #[test]
    fn test_raw_lf_normalized() {
        let field = parse("Date", "not a\n date");
        assert_eq!(render(&field), "Date: not a\r\n date");
    }

    #[test]
    fn test_generate_typed() {
        let field = parse("content-type", "TEXT/plain; charset=\"utf-8\"");
        assert_eq!(render(&field), "content-type: text/plain; charset=utf-8");

        let field = HeaderField::text("Subject", "Grüße");
        let out = render(&field);
        assert!(out.starts_with("Subject: =?utf-8?"));
    }

    #[test]
    fn test_set_value_drops_raw() {
        let mut field = parse("Date", "garbage");
        field.set_value(FieldValue::Text(Text::from("replaced")));
        assert!(field.is_parsed());
        assert!(field.raw().is_empty());
        assert_eq!(render(&field), "Date: replaced");
    }
}
