//! RFC 5322 date-time values.

use std::fmt;

use chrono::{FixedOffset, Local};

/// A header date.
///
/// Parsing is lenient: text chrono cannot read is kept verbatim and written
/// back unchanged.
#[derive(Debug, Clone, Default)]
pub struct DateTime {
    value: Option<chrono::DateTime<FixedOffset>>,
    raw: String,
}

impl DateTime {
    /// Wraps a chrono date.
    #[must_use]
    pub fn new(value: chrono::DateTime<FixedOffset>) -> Self {
        Self {
            value: Some(value),
            raw: String::new(),
        }
    }

    /// The current local time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Local::now().fixed_offset())
    }

    /// Parses an RFC 5322 date, ignoring comments and folding.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let raw = String::from_utf8_lossy(raw);
        let cleaned = strip_comments(&raw)
            .split_ascii_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let value = chrono::DateTime::parse_from_rfc2822(&cleaned)
            .or_else(|_| chrono::DateTime::parse_from_rfc2822(&format!("{cleaned} +0000")))
            .ok();
        if value.is_none() && !cleaned.is_empty() {
            tracing::debug!(date = %cleaned, "unparsable date kept verbatim");
        }

        Self {
            value,
            raw: cleaned,
        }
    }

    /// Returns the parsed date, if parsing succeeded.
    #[must_use]
    pub const fn value(&self) -> Option<&chrono::DateTime<FixedOffset>> {
        self.value.as_ref()
    }

    /// Returns true if the date was understood.
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        self.value.is_some()
    }

    /// Renders the date for a header.
    #[must_use]
    pub fn generate(&self) -> String {
        self.value
            .map_or_else(|| self.raw.clone(), |value| value.to_rfc2822())
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.raw == other.raw,
            _ => false,
        }
    }
}

impl Eq for DateTime {}

impl From<chrono::DateTime<FixedOffset>> for DateTime {
    fn from(value: chrono::DateTime<FixedOffset>) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.generate())
    }
}

fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc2822() {
        let date = DateTime::parse(b"Tue, 1 Jul 2003 10:52:37 +0200");
        let value = date.value().unwrap();
        assert_eq!(value.year(), 2003);
        assert_eq!(value.hour(), 10);
        assert_eq!(value.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_with_comment_and_folding() {
        let date = DateTime::parse(b"Tue, 1 Jul 2003\r\n 10:52:37 +0000 (UTC)");
        assert!(date.is_parsed());
        assert_eq!(date.value().unwrap().minute(), 52);
    }

    #[test]
    fn test_missing_zone_assumes_utc() {
        let date = DateTime::parse(b"1 Jul 2003 10:52:37");
        assert_eq!(date.value().unwrap().offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_unparsable_kept_verbatim() {
        let date = DateTime::parse(b"  sometime   yesterday ");
        assert!(!date.is_parsed());
        assert_eq!(date.generate(), "sometime yesterday");
    }

    #[test]
    fn test_generate_reparses_equal() {
        let date = DateTime::parse(b"Wed, 2 Jul 2003 08:00:00 -0500");
        let again = DateTime::parse(date.generate().as_bytes());
        assert_eq!(date, again);
    }
}
