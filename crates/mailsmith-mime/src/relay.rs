//! `Received:` trace fields.
//!
//! A relay value is a run of clauses introduced by keywords followed by a
//! date after the last `;`:
//!
//! ```text
//! from mx.example.org by mail.example.com with ESMTP id 42 for <u@example.com>; <date>
//! ```
//!
//! Keywords may be abbreviated, `fr` is not enough for `from` but `wi` is
//! enough for `with`. Comments in parentheses are never read as keywords.

use crate::charset::Charset;
use crate::datetime::DateTime;
use crate::text::{FoldFlags, Text};
use crate::word::Word;

/// The parsed form of a `Received:` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relay {
    from: String,
    by: String,
    via: String,
    with: Vec<String>,
    id: String,
    for_: String,
    date: DateTime,
    parsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    None,
    From,
    By,
    Via,
    With,
    Id,
    For,
}

/// Keyword, shortest accepted abbreviation, clause.
const KEYWORDS: [(&str, usize, Clause); 6] = [
    ("from", 4, Clause::From),
    ("by", 2, Clause::By),
    ("via", 2, Clause::Via),
    ("with", 2, Clause::With),
    ("id", 2, Clause::Id),
    ("for", 2, Clause::For),
];

fn keyword(word: &str) -> Option<Clause> {
    KEYWORDS
        .iter()
        .find(|(name, min, _)| {
            word.len() >= *min
                && word.len() <= name.len()
                && name.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes())
        })
        .map(|&(_, _, clause)| clause)
}

/// Returns true if `word` opens a comment it does not close.
fn opens_comment(word: &str) -> bool {
    match (word.rfind('('), word.rfind(')')) {
        (Some(open), Some(close)) => close < open,
        (Some(_), None) => true,
        _ => false,
    }
}

impl Relay {
    /// Creates an empty relay stamped with `date`.
    #[must_use]
    pub fn new(date: DateTime) -> Self {
        Self {
            date,
            parsed: true,
            ..Self::default()
        }
    }

    /// Parses a raw `Received:` value.
    ///
    /// Without a `;` the value cannot be split and the relay is marked
    /// unparsed.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let Some(semicolon) = raw.iter().rposition(|&b| b == b';') else {
            tracing::debug!("Received field without date separator");
            return Self::default();
        };

        let mut relay = Self::new(DateTime::parse(&raw[semicolon + 1..]));
        let clauses = String::from_utf8_lossy(&raw[..semicolon]);

        let mut clause = Clause::None;
        let mut pending: Vec<&str> = Vec::new();
        let mut in_comment = false;

        for token in clauses.split_ascii_whitespace() {
            let mut word = token;
            if in_comment {
                if let Some(close) = word.find(')') {
                    pending.push(&word[..=close]);
                    word = &word[close + 1..];
                    in_comment = false;
                }
            }

            let next = if in_comment { None } else { keyword(word) };
            if let Some(next) = next {
                relay.assign(clause, &pending);
                pending.clear();
                clause = next;
            } else {
                if !in_comment && opens_comment(word) {
                    in_comment = true;
                }
                if !word.is_empty() {
                    pending.push(word);
                }
            }
        }
        relay.assign(clause, &pending);

        relay
    }

    fn assign(&mut self, clause: Clause, words: &[&str]) {
        let value = words.join(" ");
        match clause {
            Clause::None => {}
            Clause::From => self.from = value,
            Clause::By => self.by = value,
            Clause::Via => self.via = value,
            Clause::With => self.with.push(value),
            Clause::Id => self.id = value,
            Clause::For => self.for_ = value,
        }
    }

    /// Returns true if the value was split into clauses.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// The `from` clause.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// The `by` clause.
    #[must_use]
    pub fn by(&self) -> &str {
        &self.by
    }

    /// The `via` clause.
    #[must_use]
    pub fn via(&self) -> &str {
        &self.via
    }

    /// Every `with` clause, in order.
    #[must_use]
    pub fn with(&self) -> &[String] {
        &self.with
    }

    /// The `id` clause.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `for` clause.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.for_
    }

    /// The date after the `;`.
    #[must_use]
    pub const fn date(&self) -> &DateTime {
        &self.date
    }

    /// Sets the `from` clause.
    pub fn set_from(&mut self, value: impl Into<String>) {
        self.from = value.into();
    }

    /// Sets the `by` clause.
    pub fn set_by(&mut self, value: impl Into<String>) {
        self.by = value.into();
    }

    /// Sets the `via` clause.
    pub fn set_via(&mut self, value: impl Into<String>) {
        self.via = value.into();
    }

    /// Appends a `with` clause.
    pub fn add_with(&mut self, value: impl Into<String>) {
        self.with.push(value.into());
    }

    /// Sets the `id` clause.
    pub fn set_id(&mut self, value: impl Into<String>) {
        self.id = value.into();
    }

    /// Sets the `for` clause.
    pub fn set_recipient(&mut self, value: impl Into<String>) {
        self.for_ = value.into();
    }

    /// Sets the date.
    pub fn set_date(&mut self, date: DateTime) {
        self.date = date;
    }

    /// Renders the clauses in canonical order followed by `; date`.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut clauses: Vec<String> = Vec::new();
        let mut push = |keyword: &str, value: &str| {
            if !value.is_empty() {
                clauses.push(format!("{keyword} {value}"));
            }
        };
        push("from", &self.from);
        push("by", &self.by);
        push("via", &self.via);
        for with in &self.with {
            push("with", with);
        }
        push("id", &self.id);
        push("for", &self.for_);

        format!("{}; {}", clauses.join(" "), self.date.generate())
    }

    /// Writes the canonical form, folded but never encoded.
    pub(crate) fn generate(&self, out: &mut Vec<u8>, max_line_length: usize, cur_pos: usize) -> usize {
        let canonical = self.canonical();
        let text = Text::from_word(Word::new(canonical.as_bytes(), Charset::us_ascii()));
        text.encode_and_fold(out, max_line_length, cur_pos, FoldFlags::NO_ENCODING)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::text::line_length;

    const DATE: &str = "Tue, 1 Jul 2003 10:52:37 +0200";

    #[test]
    fn test_parse_all_clauses() {
        let raw = format!("from A by B with C,D id I for F; {DATE}");
        let relay = Relay::parse(raw.as_bytes());
        assert!(relay.is_parsed());
        assert_eq!(relay.from(), "A");
        assert_eq!(relay.by(), "B");
        assert_eq!(relay.with(), ["C,D"]);
        assert_eq!(relay.id(), "I");
        assert_eq!(relay.recipient(), "F");
        assert!(relay.date().is_parsed());
    }

    #[test]
    fn test_abbreviated_keywords() {
        let relay = Relay::parse(format!("FROM a wi smtp wit lmtp fo b; {DATE}").as_bytes());
        assert_eq!(relay.from(), "a");
        assert_eq!(relay.with(), ["smtp", "lmtp"]);
        assert_eq!(relay.recipient(), "b");
    }

    #[test]
    fn test_short_from_is_not_a_keyword() {
        let relay = Relay::parse(format!("by host fro x; {DATE}").as_bytes());
        assert_eq!(relay.by(), "host fro x");
        assert_eq!(relay.from(), "");
    }

    #[test]
    fn test_comment_hides_keywords() {
        let raw = format!("from mx (helo by the way) by relay; {DATE}");
        let relay = Relay::parse(raw.as_bytes());
        assert_eq!(relay.from(), "mx (helo by the way)");
        assert_eq!(relay.by(), "relay");
    }

    #[test]
    fn test_comment_close_glued_to_keyword() {
        let raw = format!("from mx (helo x)by relay; {DATE}");
        let relay = Relay::parse(raw.as_bytes());
        assert_eq!(relay.from(), "mx (helo x)");
        assert_eq!(relay.by(), "relay");
    }

    #[test]
    fn test_single_word_comment() {
        let raw = format!("from mx (comment) by relay; {DATE}");
        let relay = Relay::parse(raw.as_bytes());
        assert_eq!(relay.from(), "mx (comment)");
        assert_eq!(relay.by(), "relay");
    }

    #[test]
    fn test_words_before_first_keyword_dropped() {
        let relay = Relay::parse(format!("junk from a; {DATE}").as_bytes());
        assert_eq!(relay.from(), "a");
        assert!(!relay.canonical().contains("junk"));
    }

    #[test]
    fn test_missing_semicolon_is_unparsed() {
        let relay = Relay::parse(b"from a by b");
        assert!(!relay.is_parsed());
    }

    #[test]
    fn test_canonical_order() {
        let relay = Relay::parse(format!("for F id I with C by B from A; {DATE}").as_bytes());
        let canonical = relay.canonical();
        assert!(canonical.starts_with("from A by B with C id I for F; "));
        let again = Relay::parse(canonical.as_bytes());
        assert_eq!(again, relay);
    }

    #[test]
    fn test_generate_never_encodes() {
        let mut relay = Relay::new(DateTime::parse(DATE.as_bytes()));
        relay.set_from("hôte");
        let mut out = Vec::new();
        relay.generate(&mut out, line_length::RECOMMENDED, 10);
        assert!(String::from_utf8(out).unwrap().starts_with("from hôte;"));
    }
}
