//! Header blocks.

use crate::body::line_bounds;
use crate::error::{Error, Result};
use crate::field::HeaderField;
use crate::session::Config;

/// An ordered block of header fields.
///
/// Field order is kept for generation and lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<HeaderField>,
}

const fn is_wsp(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

impl Header {
    /// Creates an empty header.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parses fields from `buffer[position..end]`.
    ///
    /// Parsing stops after the first blank line or at `end`. Returns the
    /// header and the offset just past the blank line. Malformed lines are
    /// skipped; nothing here fails.
    #[must_use]
    pub fn parse(config: &Config, buffer: &[u8], position: usize, end: usize) -> (Self, usize) {
        let end = end.min(buffer.len());
        let mut header = Self::new();
        let mut pos = position.min(end);

        while pos < end {
            let (line_end, next) = line_bounds(buffer, pos, end);

            if line_end == pos {
                // blank line: end of header
                pos = next;
                break;
            }

            if is_wsp(buffer[pos]) {
                tracing::debug!(offset = pos, "continuation line without a field");
                pos = next;
                continue;
            }

            let Some(colon) = buffer[pos..line_end].iter().position(|&b| b == b':') else {
                tracing::debug!(offset = pos, "header line without colon skipped");
                pos = next;
                continue;
            };
            let colon = pos + colon;

            let name = String::from_utf8_lossy(&buffer[pos..colon]);
            let name = name.trim_end_matches(is_wsp_char);
            if name.is_empty() || name.contains(|c: char| c.is_ascii_whitespace() || c.is_control()) {
                tracing::debug!(offset = pos, "malformed field name skipped");
                pos = next;
                continue;
            }

            // Fold in continuation lines.
            let mut value_end = line_end;
            let mut after = next;
            while after < end && is_wsp(buffer[after]) {
                let (cont_end, cont_next) = line_bounds(buffer, after, end);
                value_end = cont_end;
                after = cont_next;
            }

            let mut value_start = colon + 1;
            while value_start < value_end && buffer[value_start].is_ascii_whitespace() {
                value_start += 1;
            }

            let kind = config.registry.kind_for(name);
            header.fields.push(HeaderField::parse(
                name,
                kind,
                buffer,
                value_start,
                value_end,
                &config.default_charset,
            ));
            pos = after;
        }

        (header, pos)
    }

    /// Writes every field followed by CRLF. The blank separator line is not
    /// written.
    pub fn generate(&self, out: &mut Vec<u8>, max_line_length: usize) {
        for field in &self.fields {
            field.generate(out, max_line_length, 0);
            out.extend_from_slice(b"\r\n");
        }
    }

    /// Returns the first field with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchField`] if no field matches.
    pub fn find(&self, name: &str) -> Result<&HeaderField> {
        self.fields
            .iter()
            .find(|field| field.is_named(name))
            .ok_or_else(|| Error::NoSuchField(name.to_string()))
    }

    /// Returns the first field with the given name, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchField`] if no field matches.
    pub fn find_mut(&mut self, name: &str) -> Result<&mut HeaderField> {
        self.fields
            .iter_mut()
            .find(|field| field.is_named(name))
            .ok_or_else(|| Error::NoSuchField(name.to_string()))
    }

    /// Returns every field with the given name, in order.
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderField> + 'a {
        self.fields.iter().filter(move |field| field.is_named(name))
    }

    /// Returns true if a field with the given name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.is_named(name))
    }

    /// Appends a field.
    pub fn append(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    /// Inserts a field at `index`, or appends if `index` is past the end.
    pub fn insert(&mut self, index: usize, field: HeaderField) {
        let index = index.min(self.fields.len());
        self.fields.insert(index, field);
    }

    /// Replaces the first field with the same name, or appends.
    pub fn set(&mut self, field: HeaderField) {
        match self.fields.iter_mut().find(|f| f.is_named(field.name())) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    /// Removes every field with the given name. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|field| !field.is_named(name));
        before - self.fields.len()
    }

    /// Returns the fields in order.
    #[must_use]
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the fields in order.
    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }
}

const fn is_wsp_char(c: char) -> bool {
    c == ' ' || c == '\t'
}

impl<'a> IntoIterator for &'a Header {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<HeaderField> for Header {
    fn from_iter<I: IntoIterator<Item = HeaderField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
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
    use crate::field::FieldKind;
    use crate::text::line_length;

    fn parse(raw: &str) -> (Header, usize) {
        Header::parse(&Config::default(), raw.as_bytes(), 0, raw.len())
    }

    #[test]
    fn test_parse_stops_at_blank_line() {
        let raw = "From: a@example.com\r\nSubject: hi\r\n\r\nbody";
        let (header, pos) = parse(raw);
        assert_eq!(header.len(), 2);
        assert_eq!(&raw[pos..], "body");
    }

    #[test]
    fn test_parse_lf_only() {
        let raw = "To: b@example.com\nX-Test: yes\n\nbody\n";
        let (header, pos) = parse(raw);
        assert_eq!(header.len(), 2);
        assert_eq!(&raw[pos..], "body\n");
    }

    #[test]
    fn test_parse_folded_value() {
        let raw = "Subject: a long\r\n\tsubject line\r\n\r\n";
        let (header, _) = parse(raw);
        let subject = header.find("subject").unwrap().as_text().unwrap();
        assert_eq!(subject.to_string(), "a long\tsubject line");
    }

    #[test]
    fn test_value_on_continuation_line() {
        let raw = "Subject:\r\n  hello\r\n\r\n";
        let (header, _) = parse(raw);
        assert_eq!(header.find("Subject").unwrap().raw_text(), "hello");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let raw = "  orphan\r\nno colon here\r\nBad Name: x\r\nGood: y\r\n\r\n";
        let (header, _) = parse(raw);
        assert_eq!(header.len(), 1);
        assert!(header.has("good"));
    }

    #[test]
    fn test_parse_respects_end() {
        let raw = "A: 1\r\nB: 2\r\n";
        let (header, pos) = Header::parse(&Config::default(), raw.as_bytes(), 0, 6);
        assert_eq!(header.len(), 1);
        assert_eq!(pos, 6);
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let (header, _) = parse("From: a@example.com\r\n\r\n");
        assert!(header.find("From").is_ok());
        assert!(header.find("FROM").is_ok());
        assert!(matches!(header.find("To"), Err(Error::NoSuchField(name)) if name == "To"));
    }

    #[test]
    fn test_find_returns_first() {
        let (header, _) = parse("Received: x; 1 Jan 2020 00:00:00 +0000\r\nReceived: y; 2 Jan 2020 00:00:00 +0000\r\n\r\n");
        let first = header.find("received").unwrap();
        assert!(first.raw_text().starts_with("x;"));
        assert_eq!(header.find_all("Received").count(), 2);
    }

    #[test]
    fn test_registry_from_config() {
        let config = Config::builder().field("X-List", FieldKind::MailboxList).build();
        let raw = b"X-List: a@b.c, d@e.f\r\n\r\n";
        let (header, _) = Header::parse(&config, raw, 0, raw.len());
        assert_eq!(header.find("x-list").unwrap().as_mailbox_list().unwrap().len(), 2);
    }

    #[test]
    fn test_set_insert_remove() {
        let mut header = Header::new();
        header.append(HeaderField::text("Subject", "one"));
        header.set(HeaderField::text("subject", "two"));
        assert_eq!(header.len(), 1);
        header.insert(0, HeaderField::text("X-First", "1"));
        assert_eq!(header.fields()[0].name(), "X-First");
        header.append(HeaderField::text("Subject", "three"));
        assert_eq!(header.remove("SUBJECT"), 2);
        assert_eq!(header.len(), 1);
    }

    #[test]
    fn test_generate_round_trip() {
        let raw = "From: Someone <a@example.com>\r\nSubject: hello\r\nX-Junk: kept\r\n";
        let (header, _) = parse(raw);
        let mut out = Vec::new();
        header.generate(&mut out, line_length::RECOMMENDED);
        let again = Header::parse(&Config::default(), &out, 0, out.len()).0;
        assert_eq!(header, again);
        assert!(out.ends_with(b"kept\r\n"));
    }
}
