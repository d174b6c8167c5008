//! Dot-stuffing for the end-of-data marker used by SMTP `DATA` and POP3
//! multi-line responses.

/// Doubles every `.` that starts a line, across any number of chunks.
#[derive(Debug, Clone)]
pub struct DotStuffer {
    line_start: bool,
    tail: [u8; 2],
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DotStuffer {
    /// Creates a stuffer positioned at the start of a line.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            line_start: true,
            tail: [0; 2],
        }
    }

    /// Appends the stuffed form of `chunk` to `out`.
    pub fn stuff(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        out.reserve(chunk.len());
        for &byte in chunk {
            if self.line_start && byte == b'.' {
                out.push(b'.');
            }
            out.push(byte);
            self.line_start = byte == b'\n';
            self.tail = [self.tail[1], byte];
        }
    }

    /// Returns true if everything stuffed so far ended with CRLF.
    #[must_use]
    pub fn ends_with_crlf(&self) -> bool {
        self.tail == *b"\r\n"
    }

    /// The end-of-data marker to send after the last chunk.
    #[must_use]
    pub fn terminator(&self) -> &'static [u8] {
        if self.ends_with_crlf() {
            b".\r\n"
        } else {
            b"\r\n.\r\n"
        }
    }
}

/// Returns true once `buffer` holds a complete dot-terminated block.
#[must_use]
pub fn ends_with_dot_line(buffer: &[u8]) -> bool {
    buffer.ends_with(b"\r\n.\r\n") || buffer == b".\r\n"
}

/// Removes the terminating `.` line, if any, and undoes dot-stuffing.
#[must_use]
pub fn unstuff(block: &[u8]) -> Vec<u8> {
    let body = if block == b".\r\n" {
        &[][..]
    } else {
        block
            .strip_suffix(b".\r\n")
            .filter(|rest| rest.ends_with(b"\r\n"))
            .unwrap_or(block)
    };

    let mut out = Vec::with_capacity(body.len());
    let mut line_start = true;
    for &byte in body {
        let skip = line_start && byte == b'.';
        if !skip {
            out.push(byte);
        }
        line_start = byte == b'\n';
    }
    out
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
    use proptest::prelude::*;

    fn stuff_all(chunks: &[&[u8]]) -> (Vec<u8>, DotStuffer) {
        let mut stuffer = DotStuffer::new();
        let mut out = Vec::new();
        for chunk in chunks {
            stuffer.stuff(chunk, &mut out);
        }
        (out, stuffer)
    }

    #[test]
    fn test_leading_dot_doubled() {
        let (out, _) = stuff_all(&[b".hidden\r\nplain\r\n.\r\n"]);
        assert_eq!(out, b"..hidden\r\nplain\r\n..\r\n");
    }

    #[test]
    fn test_state_survives_chunk_boundary() {
        let (out, _) = stuff_all(&[b"line\r", b"\n", b".dot"]);
        assert_eq!(out, b"line\r\n..dot");
    }

    #[test]
    fn test_inner_dots_untouched() {
        let (out, _) = stuff_all(&[b"a.b\r\nc..d"]);
        assert_eq!(out, b"a.b\r\nc..d");
    }

    #[test]
    fn test_terminator() {
        let (_, stuffer) = stuff_all(&[b"body\r\n"]);
        assert_eq!(stuffer.terminator(), b".\r\n");
        let (_, stuffer) = stuff_all(&[b"body"]);
        assert_eq!(stuffer.terminator(), b"\r\n.\r\n");
        let (_, stuffer) = stuff_all(&[]);
        assert_eq!(stuffer.terminator(), b"\r\n.\r\n");
    }

    #[test]
    fn test_unstuff_block() {
        assert_eq!(unstuff(b"..a\r\nb\r\n.\r\n"), b".a\r\nb\r\n");
        assert_eq!(unstuff(b".\r\n"), b"");
        assert_eq!(unstuff(b"no terminator"), b"no terminator");
    }

    #[test]
    fn test_ends_with_dot_line() {
        assert!(ends_with_dot_line(b"a\r\n.\r\n"));
        assert!(ends_with_dot_line(b".\r\n"));
        assert!(!ends_with_dot_line(b"a\r\n..\r\n"));
        assert!(!ends_with_dot_line(b"a.\r\n"));
    }

    proptest! {
        #[test]
        fn prop_unstuff_inverts_stuff(
            lines in prop::collection::vec("[.a-z ]{0,12}", 0..8),
            split in 0usize..64,
        ) {
            let mut data = lines.join("\r\n").into_bytes();
            data.extend_from_slice(b"\r\n");
            let split = split.min(data.len());

            let (mut wire, stuffer) = stuff_all(&[&data[..split], &data[split..]]);
            wire.extend_from_slice(stuffer.terminator());

            prop_assert!(ends_with_dot_line(&wire));
            prop_assert_eq!(unstuff(&wire), data);
        }
    }
}
