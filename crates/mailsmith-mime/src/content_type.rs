//! MIME content type handling.

use std::fmt;

use crate::charset::Charset;
use crate::error::{Error, Result};

/// MIME content type with parameters.
///
/// Parameters keep their original order; names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a multipart content type with the given subtype and boundary.
    #[must_use]
    pub fn multipart(sub_type: impl Into<String>, boundary: impl Into<String>) -> Self {
        Self::new("multipart", sub_type).with_parameter("boundary", boundary)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(key, value);
        self
    }

    /// Sets a parameter, replacing an existing one of the same name in place.
    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .parameters
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.parameters.push((key, value)),
        }
    }

    /// Returns a parameter value by name.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<Charset> {
        self.parameter("charset").map(Charset::new)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary").filter(|b| !b.is_empty())
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = split_unquoted(s, ';').into_iter();

        let type_str = parts.next().unwrap_or_default();
        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {s:?}")))?;
        let main_type = main_type.trim().to_ascii_lowercase();
        let sub_type = sub_type.trim().to_ascii_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!("Empty type in {s:?}")));
        }

        let mut content_type = Self::new(main_type, sub_type);
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                let key = key.trim().to_ascii_lowercase();
                if !key.is_empty() {
                    content_type.parameters.push((key, unquote(value.trim())));
                }
            }
        }

        Ok(content_type)
    }

    /// Writes the content type, folding between parameters.
    pub(crate) fn generate(&self, out: &mut Vec<u8>, max_line_length: usize, cur_pos: usize) -> usize {
        let head = format!("{}/{}", self.main_type, self.sub_type);
        out.extend_from_slice(head.as_bytes());
        let mut pos = cur_pos + head.len();

        for (key, value) in &self.parameters {
            let param = format!("{key}={}", quote_if_needed(value));
            out.push(b';');
            pos += 1;
            if pos.saturating_add(param.len() + 1) > max_line_length {
                out.extend_from_slice(b"\r\n ");
                pos = 1;
            } else {
                out.push(b' ');
                pos += 1;
            }
            out.extend_from_slice(param.as_bytes());
            pos += param.len();
        }
        pos
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::new("text", "plain")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        for (key, value) in &self.parameters {
            write!(f, "; {key}={}", quote_if_needed(value))?;
        }

        Ok(())
    }
}

fn quote_if_needed(value: &str) -> String {
    if !value.is_empty()
        && !value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
    {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits on `separator` outside double quotes.
pub(crate) fn split_unquoted(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            parts.push(s[start..i].trim());
            start = i + c.len_utf8();
        }
    }
    parts.push(s[start..].trim());
    parts
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some(Charset::utf_8()));
    }

    #[test]
    fn test_multipart() {
        let ct = ContentType::multipart("mixed", "boundary123");
        assert_eq!(ct.main_type, "multipart");
        assert_eq!(ct.sub_type, "mixed");
        assert_eq!(ct.boundary(), Some("boundary123"));
        assert!(ct.is_multipart());
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; Charset=utf-8; format=flowed").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.parameter("charset"), Some("utf-8"));
        assert_eq!(ct.parameters[1].0, "format");
    }

    #[test]
    fn test_parse_quoted_parameter_with_separator() {
        let ct = ContentType::parse(r#"multipart/mixed; boundary="a;b \"c\"""#).unwrap();
        assert_eq!(ct.boundary(), Some(r#"a;b "c""#));
    }

    #[test]
    fn test_parse_missing_subtype() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("/plain").is_err());
    }

    #[test]
    fn test_set_parameter_replaces_in_place() {
        let mut ct = ContentType::parse("text/plain; charset=us-ascii; format=flowed").unwrap();
        ct.set_parameter("CHARSET", "utf-8");
        assert_eq!(ct.parameters.len(), 2);
        assert_eq!(ct.parameters[0].1, "utf-8");
    }

    #[test]
    fn test_display_quotes_when_needed() {
        let ct = ContentType::multipart("mixed", "=_part 1");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"=_part 1\"");
        assert_eq!(
            ContentType::parse(&ct.to_string()).unwrap().boundary(),
            Some("=_part 1")
        );
    }

    #[test]
    fn test_generate_folds_parameters() {
        let ct = ContentType::new("application", "octet-stream")
            .with_parameter("name", "a-rather-long-attachment-name.bin")
            .with_parameter("x-extra", "another-long-parameter-value");
        let mut out = Vec::new();
        ct.generate(&mut out, 60, 14);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(";\r\n "));
        assert_eq!(ContentType::parse(&text.replace("\r\n", "")).unwrap(), ct);
    }
}
