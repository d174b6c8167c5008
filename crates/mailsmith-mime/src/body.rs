//! Part bodies and multipart splitting.

use std::ops::Range;

use crate::part::PartId;

/// The body of one part.
///
/// A body is a leaf holding encoded contents, or composite holding child
/// parts. Prolog and epilog are the text around the boundary delimiters of
/// a composite body.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub(crate) contents: Vec<u8>,
    pub(crate) children: Vec<PartId>,
    pub(crate) prolog: Vec<u8>,
    pub(crate) epilog: Vec<u8>,
}

impl Body {
    /// Leaf contents, still transfer-encoded.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Child parts, in order.
    #[must_use]
    pub fn children(&self) -> &[PartId] {
        &self.children
    }

    /// Text before the first delimiter.
    #[must_use]
    pub fn prolog(&self) -> &[u8] {
        &self.prolog
    }

    /// Text after the close delimiter.
    #[must_use]
    pub fn epilog(&self) -> &[u8] {
        &self.epilog
    }

    /// Returns true if the body has child parts.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Byte ranges of a split multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Multipart {
    pub prolog: Range<usize>,
    pub parts: Vec<Range<usize>>,
    pub epilog: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

/// Returns the end of the line starting at `pos` (exclusive of the line
/// break) and the start of the next line.
pub(crate) fn line_bounds(buffer: &[u8], pos: usize, end: usize) -> (usize, usize) {
    match buffer[pos..end].iter().position(|&b| b == b'\n') {
        Some(offset) => {
            let newline = pos + offset;
            let content_end = if newline > pos && buffer[newline - 1] == b'\r' {
                newline - 1
            } else {
                newline
            };
            (content_end, newline + 1)
        }
        None => (end, end),
    }
}

fn delimiter_kind(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(delimiter)?;
    let padding = |bytes: &[u8]| bytes.iter().all(|&b| b == b' ' || b == b'\t');
    match rest.strip_prefix(b"--") {
        Some(tail) if padding(tail) => Some(Delimiter::Close),
        _ if padding(rest) => Some(Delimiter::Open),
        _ => None,
    }
}

/// The line break before a delimiter belongs to the delimiter.
fn before_break(buffer: &[u8], floor: usize, pos: usize) -> usize {
    let mut p = pos;
    if p > floor && buffer[p - 1] == b'\n' {
        p -= 1;
        if p > floor && buffer[p - 1] == b'\r' {
            p -= 1;
        }
    }
    p
}

/// Splits `buffer[start..end]` at `--boundary` lines.
///
/// Returns `None` when no part is delimited, in which case the body is a
/// leaf. A missing close delimiter ends the last part at `end`.
pub(crate) fn split(buffer: &[u8], start: usize, end: usize, boundary: &str) -> Option<Multipart> {
    let end = end.min(buffer.len());
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut prolog = start..start;
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut line = start.min(end);

    while line < end {
        let (content_end, next) = line_bounds(buffer, line, end);
        if let Some(kind) = delimiter_kind(&buffer[line..content_end], delimiter) {
            match part_start {
                None => prolog = start..before_break(buffer, start, line),
                Some(from) => parts.push(from..before_break(buffer, from, line)),
            }
            if kind == Delimiter::Close {
                if parts.is_empty() {
                    return None;
                }
                return Some(Multipart {
                    prolog,
                    parts,
                    epilog: next..end,
                });
            }
            part_start = Some(next);
        }
        line = next;
    }

    let from = part_start?;
    tracing::debug!(%boundary, "multipart body without close delimiter");
    parts.push(from..end);
    Some(Multipart {
        prolog,
        parts,
        epilog: end..end,
    })
}

/// Guesses a boundary from the first line starting with `--`.
pub(crate) fn guess_boundary(buffer: &[u8], start: usize, end: usize) -> Option<String> {
    let end = end.min(buffer.len());
    let mut line = start.min(end);
    while line < end {
        let (content_end, next) = line_bounds(buffer, line, end);
        if let Some(rest) = buffer[line..content_end].strip_prefix(b"--") {
            let len = rest
                .iter()
                .rposition(|&b| b != b' ' && b != b'\t')
                .map_or(0, |last| last + 1);
            if len > 0 {
                return Some(String::from_utf8_lossy(&rest[..len]).into_owned());
            }
        }
        line = next;
    }
    None
}

/// Returns true if `needle` occurs in `haystack`.
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
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

    fn slices<'a>(buffer: &'a str, parts: &[Range<usize>]) -> Vec<&'a str> {
        parts.iter().map(|range| &buffer[range.clone()]).collect()
    }

    #[test]
    fn test_split_with_prolog_and_epilog() {
        let body = "intro\r\n--b\r\none\r\n--b\r\ntwo\r\n--b--\r\nouttro";
        let split = split(body.as_bytes(), 0, body.len(), "b").unwrap();
        assert_eq!(&body[split.prolog.clone()], "intro");
        assert_eq!(slices(body, &split.parts), ["one", "two"]);
        assert_eq!(&body[split.epilog.clone()], "outtro");
    }

    #[test]
    fn test_split_lf_and_padding() {
        let body = "--b  \none\n--b--\t\n";
        let split = split(body.as_bytes(), 0, body.len(), "b").unwrap();
        assert_eq!(split.prolog, 0..0);
        assert_eq!(slices(body, &split.parts), ["one"]);
    }

    #[test]
    fn test_split_missing_close() {
        let body = "--b\r\none\r\n--b\r\ntwo\r\n";
        let split = split(body.as_bytes(), 0, body.len(), "b").unwrap();
        assert_eq!(slices(body, &split.parts), ["one", "two\r\n"]);
        assert!(split.epilog.is_empty());
    }

    #[test]
    fn test_longer_boundary_is_not_a_delimiter() {
        let body = "--bb\r\nx\r\n--b\r\ny\r\n--b--";
        let split = split(body.as_bytes(), 0, body.len(), "b").unwrap();
        assert_eq!(&body[split.prolog.clone()], "--bb\r\nx");
        assert_eq!(slices(body, &split.parts), ["y"]);
    }

    #[test]
    fn test_no_delimiter_is_leaf() {
        let body = "just text\r\n-- signature\r\n";
        assert!(split(body.as_bytes(), 0, body.len(), "b").is_none());
        assert!(split(b"--b--\r\n", 0, 7, "b").is_none());
    }

    #[test]
    fn test_empty_part() {
        let body = "--b\r\n--b\r\nx\r\n--b--";
        let split = split(body.as_bytes(), 0, body.len(), "b").unwrap();
        assert_eq!(slices(body, &split.parts), ["", "x"]);
    }

    #[test]
    fn test_guess_boundary() {
        let body = b"preamble\r\n--abc123 \r\nContent-Type: text/plain\r\n";
        assert_eq!(guess_boundary(body, 0, body.len()).as_deref(), Some("abc123"));
        assert_eq!(guess_boundary(b"no\r\n", 0, 4), None);
    }

    #[test]
    fn test_contains() {
        assert!(contains(b"a--bc", b"--b"));
        assert!(!contains(b"a-b", b"--b"));
    }
}
