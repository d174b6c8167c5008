//! Mailboxes and mailbox lists (`From`, `To`, `Cc`, ...).

use std::fmt;

use crate::charset::Charset;
use crate::text::{FoldFlags, Text};

const SPECIALS: &[u8] = b"()<>[]:;@\\,.\"";

/// A single mailbox: an optional display name and an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mailbox {
    name: Text,
    email: String,
}

impl Mailbox {
    /// Creates a mailbox with no display name.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: Text::new(),
            email: email.into(),
        }
    }

    /// Creates a mailbox with a display name.
    #[must_use]
    pub fn with_name(name: impl Into<Text>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &Text {
        &self.name
    }

    /// Returns the address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns true if the mailbox has no address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
    }

    /// Parses `Name <addr>`, `"Quoted" <addr>`, `addr (Comment)` or `addr`.
    #[must_use]
    pub fn parse(raw: &[u8], default_charset: &Charset) -> Self {
        let raw = trim(raw);

        if let Some(open) = find_unquoted(raw, b'<') {
            let close = raw[open..]
                .iter()
                .position(|&b| b == b'>')
                .map_or(raw.len(), |i| open + i);
            let mut address = trim(&raw[open + 1..close]);
            // Obsolete source route: <@a,@b:user@host>
            if address.first() == Some(&b'@') {
                if let Some(colon) = address.iter().position(|&b| b == b':') {
                    address = &address[colon + 1..];
                }
            }
            return Self {
                name: display_name(&raw[..open], default_charset),
                email: String::from_utf8_lossy(trim(address)).into_owned(),
            };
        }

        // addr (Comment)
        let (address, comment) = match (raw.iter().position(|&b| b == b'('), raw.iter().rposition(|&b| b == b')')) {
            (Some(open), Some(close)) if open < close => {
                let mut address = raw[..open].to_vec();
                address.extend_from_slice(&raw[close + 1..]);
                (address, Some(&raw[open + 1..close]))
            }
            _ => (raw.to_vec(), None),
        };

        Self {
            name: comment.map_or_else(Text::new, |c| Text::parse(c, default_charset)),
            email: String::from_utf8_lossy(trim(&address)).into_owned(),
        }
    }

    /// Writes the mailbox. Returns the new column.
    pub(crate) fn generate(&self, out: &mut Vec<u8>, max_line_length: usize, cur_pos: usize) -> usize {
        let mut pos = cur_pos;
        if !self.name.is_empty() {
            let plain = self.name.words().iter().all(|w| !w.needs_encoding());
            let bytes: Vec<u8> = self
                .name
                .words()
                .iter()
                .flat_map(|w| w.buffer().iter().copied())
                .collect();
            if plain && bytes.iter().any(|b| SPECIALS.contains(b)) {
                let quoted = quote(&bytes);
                out.extend_from_slice(&quoted);
                pos += quoted.len();
            } else {
                pos = self.name.encode_and_fold(out, max_line_length, pos, FoldFlags::NONE);
            }

            let address_len = self.email.len() + 3;
            if pos.saturating_add(address_len) > max_line_length {
                out.extend_from_slice(b"\r\n ");
                pos = 1;
            } else {
                out.push(b' ');
                pos += 1;
            }
            out.push(b'<');
            out.extend_from_slice(self.email.as_bytes());
            out.push(b'>');
            return pos + self.email.len() + 2;
        }

        out.extend_from_slice(self.email.as_bytes());
        pos + self.email.len()
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// An ordered list of mailboxes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxList {
    mailboxes: Vec<Mailbox>,
}

impl MailboxList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mailboxes: Vec::new(),
        }
    }

    /// Parses a comma-separated list. Group syntax is flattened.
    #[must_use]
    pub fn parse(raw: &[u8], default_charset: &Charset) -> Self {
        let mut mailboxes = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut escaped = false;
        let mut angle = 0usize;
        let mut paren = 0usize;

        let flush = |from: usize, to: usize, mailboxes: &mut Vec<Mailbox>| {
            let mailbox = Mailbox::parse(&raw[from..to], default_charset);
            if !mailbox.is_empty() {
                mailboxes.push(mailbox);
            }
        };

        for (i, &b) in raw.iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' if in_quotes || paren > 0 => escaped = true,
                b'"' if paren == 0 => in_quotes = !in_quotes,
                _ if in_quotes => {}
                b'(' => paren += 1,
                b')' => paren = paren.saturating_sub(1),
                _ if paren > 0 => {}
                b'<' => angle += 1,
                b'>' => angle = angle.saturating_sub(1),
                // Group name ends at the colon
                b':' if angle == 0 => start = i + 1,
                b',' | b';' if angle == 0 => {
                    flush(start, i, &mut mailboxes);
                    start = i + 1;
                }
                _ => {}
            }
        }
        flush(start, raw.len(), &mut mailboxes);

        Self { mailboxes }
    }

    /// Returns the mailboxes.
    #[must_use]
    pub fn mailboxes(&self) -> &[Mailbox] {
        &self.mailboxes
    }

    /// Returns the first mailbox.
    #[must_use]
    pub fn first(&self) -> Option<&Mailbox> {
        self.mailboxes.first()
    }

    /// Appends a mailbox.
    pub fn push(&mut self, mailbox: Mailbox) {
        self.mailboxes.push(mailbox);
    }

    /// Appends every mailbox of `other`.
    pub fn extend(&mut self, other: &Self) {
        self.mailboxes.extend(other.mailboxes.iter().cloned());
    }

    /// Number of mailboxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mailboxes.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mailboxes.is_empty()
    }

    /// Iterates over the mailboxes.
    pub fn iter(&self) -> std::slice::Iter<'_, Mailbox> {
        self.mailboxes.iter()
    }

    /// Writes the list separated by commas, folding between entries.
    pub(crate) fn generate(&self, out: &mut Vec<u8>, max_line_length: usize, cur_pos: usize) -> usize {
        let mut pos = cur_pos;
        for (i, mailbox) in self.mailboxes.iter().enumerate() {
            if i == 0 {
                pos = mailbox.generate(out, max_line_length, pos);
                continue;
            }
            out.push(b',');
            pos += 1;

            let mut rendered = Vec::new();
            let end = mailbox.generate(&mut rendered, max_line_length, pos + 1);
            if rendered.contains(&b'\n') || end > max_line_length {
                out.extend_from_slice(b"\r\n ");
                pos = mailbox.generate(out, max_line_length, 1);
            } else {
                out.push(b' ');
                out.extend_from_slice(&rendered);
                pos = end;
            }
        }
        pos
    }
}

impl FromIterator<Mailbox> for MailboxList {
    fn from_iter<I: IntoIterator<Item = Mailbox>>(iter: I) -> Self {
        Self {
            mailboxes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MailboxList {
    type Item = &'a Mailbox;
    type IntoIter = std::slice::Iter<'a, Mailbox>;

    fn into_iter(self) -> Self::IntoIter {
        self.mailboxes.iter()
    }
}

impl From<Mailbox> for MailboxList {
    fn from(mailbox: Mailbox) -> Self {
        Self {
            mailboxes: vec![mailbox],
        }
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end.max(start)]
}

fn find_unquoted(bytes: &[u8], needle: u8) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
        } else if b == b'\\' && in_quotes {
            escaped = true;
        } else if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == needle && !in_quotes {
            return Some(i);
        }
    }
    None
}

fn display_name(raw: &[u8], default_charset: &Charset) -> Text {
    let raw = trim(raw);
    if raw.len() >= 2 && raw[0] == b'"' && raw[raw.len() - 1] == b'"' {
        let mut unescaped = Vec::with_capacity(raw.len());
        let mut escaped = false;
        for &b in &raw[1..raw.len() - 1] {
            if escaped {
                unescaped.push(b);
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else {
                unescaped.push(b);
            }
        }
        return Text::parse(&unescaped, default_charset);
    }
    Text::parse(raw, default_charset)
}

fn quote(bytes: &[u8]) -> Vec<u8> {
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'"');
    for &b in bytes {
        if b == b'"' || b == b'\\' {
            quoted.push(b'\\');
        }
        quoted.push(b);
    }
    quoted.push(b'"');
    quoted
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::text::line_length;

    fn ascii() -> Charset {
        Charset::us_ascii()
    }

    fn render(list: &MailboxList, max: usize) -> String {
        let mut out = Vec::new();
        list.generate(&mut out, max, 4);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_bare_address() {
        let mailbox = Mailbox::parse(b" user@example.com ", &ascii());
        assert_eq!(mailbox.email(), "user@example.com");
        assert!(mailbox.name().is_empty());
    }

    #[test]
    fn test_parse_named() {
        let mailbox = Mailbox::parse(b"John Doe <john@example.com>", &ascii());
        assert_eq!(mailbox.email(), "john@example.com");
        assert_eq!(mailbox.name().to_string(), "John Doe");
    }

    #[test]
    fn test_parse_quoted_name() {
        let mailbox = Mailbox::parse(br#""Doe, John \"JD\"" <john@example.com>"#, &ascii());
        assert_eq!(mailbox.name().to_string(), r#"Doe, John "JD""#);
    }

    #[test]
    fn test_parse_encoded_name() {
        let mailbox = Mailbox::parse(b"=?utf-8?Q?J=C3=B6rg?= <jorg@example.com>", &ascii());
        assert_eq!(mailbox.name().to_string(), "Jörg");
    }

    #[test]
    fn test_parse_comment_name() {
        let mailbox = Mailbox::parse(b"john@example.com (John Doe)", &ascii());
        assert_eq!(mailbox.email(), "john@example.com");
        assert_eq!(mailbox.name().to_string(), "John Doe");
    }

    #[test]
    fn test_parse_source_route() {
        let mailbox = Mailbox::parse(b"<@relay.example:user@example.com>", &ascii());
        assert_eq!(mailbox.email(), "user@example.com");
    }

    #[test]
    fn test_parse_list() {
        let list = MailboxList::parse(
            br#""Doe, John" <john@example.com>, jane@example.com,, Bob <bob@example.com>"#,
            &ascii(),
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list.mailboxes()[0].email(), "john@example.com");
        assert_eq!(list.mailboxes()[1].email(), "jane@example.com");
        assert_eq!(list.mailboxes()[2].email(), "bob@example.com");
    }

    #[test]
    fn test_parse_group() {
        let list = MailboxList::parse(b"Team: a@example.com, b@example.com;, c@example.com", &ascii());
        let emails: Vec<&str> = list.iter().map(Mailbox::email).collect();
        assert_eq!(emails, ["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn test_generate_quotes_specials() {
        let list = MailboxList::from(Mailbox::with_name("Doe, John", "john@example.com"));
        assert_eq!(render(&list, line_length::RECOMMENDED), r#""Doe, John" <john@example.com>"#);
    }

    #[test]
    fn test_generate_encodes_non_ascii() {
        let list = MailboxList::from(Mailbox::with_name("Jörg", "jorg@example.com"));
        let out = render(&list, line_length::RECOMMENDED);
        assert!(out.starts_with("=?utf-8?"));
        let reparsed = MailboxList::parse(out.as_bytes(), &ascii());
        assert_eq!(reparsed, list);
    }

    #[test]
    fn test_generate_folds_between_entries() {
        let list: MailboxList = (0..6)
            .map(|i| Mailbox::with_name(format!("Person {i}").as_str(), format!("person{i}@example.com")))
            .collect();
        let out = render(&list, 60);
        assert!(out.contains(",\r\n "));
        assert!(out.split("\r\n").all(|line| line.len() <= 60));
        let reparsed = MailboxList::parse(out.as_bytes(), &ascii());
        assert_eq!(reparsed, list);
    }
}
