//! POP3 status lines, multi-line blocks and listings.

use std::fmt::Write;

use md5::{Digest, Md5};

use mailsmith_net::{ends_with_dot_line, ends_with_line};

/// The first line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// True for `+OK`.
    pub ok: bool,
    /// Everything after the status indicator.
    pub text: String,
}

impl Status {
    /// Parses the first line of `buffer`. Anything not starting with
    /// `+OK` is a failure.
    #[must_use]
    pub fn parse(buffer: &[u8]) -> Self {
        let end = buffer
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(buffer.len());
        let line = String::from_utf8_lossy(&buffer[..end]);
        let line = line.trim_end();
        let (ok, rest) = match line.strip_prefix("+OK") {
            Some(rest) => (true, rest),
            None => (false, line.strip_prefix("-ERR").unwrap_or(line)),
        };
        Self {
            ok,
            text: rest.trim().to_string(),
        }
    }

    /// The line as the server sent it, for error reports.
    #[must_use]
    pub fn to_line(&self) -> String {
        let indicator = if self.ok { "+OK" } else { "-ERR" };
        if self.text.is_empty() {
            indicator.to_string()
        } else {
            format!("{indicator} {}", self.text)
        }
    }
}

/// Completion test for single-line responses.
#[must_use]
pub fn is_status_complete(buffer: &[u8]) -> bool {
    ends_with_line(buffer)
}

/// Completion test for multi-line responses: a `-ERR` ends with its first
/// line, a `+OK` with the lone `.` line.
#[must_use]
pub fn is_block_complete(buffer: &[u8]) -> bool {
    let Some(newline) = buffer.iter().position(|&b| b == b'\n') else {
        return false;
    };
    if !buffer.starts_with(b"+") {
        return true;
    }
    ends_with_dot_line(&buffer[newline + 1..])
}

/// Splits a complete multi-line response into status and block.
#[must_use]
pub fn split_block(buffer: &[u8]) -> (Status, &[u8]) {
    let status = Status::parse(buffer);
    let body = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map_or(&[][..], |newline| &buffer[newline + 1..]);
    (status, body)
}

/// `STAT` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stat {
    /// Number of messages.
    pub count: u32,
    /// Total size in octets.
    pub size: u64,
}

impl Stat {
    /// Parses the text after `+OK`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let count = words.next()?.parse().ok()?;
        let size = words.next()?.parse().ok()?;
        Some(Self { count, size })
    }
}

/// One `LIST` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    /// Message number.
    pub number: u32,
    /// Size in octets.
    pub size: u64,
}

impl ListEntry {
    /// Parses `number size`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let number = words.next()?.parse().ok()?;
        let size = words.next()?.parse().ok()?;
        Some(Self { number, size })
    }
}

/// One `UIDL` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidlEntry {
    /// Message number.
    pub number: u32,
    /// Server-assigned unique id.
    pub uid: String,
}

impl UidlEntry {
    /// Parses `number uid`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let number = words.next()?.parse().ok()?;
        let uid = words.next()?.to_string();
        Some(Self { number, uid })
    }
}

/// Parses each line of a listing block, skipping lines that do not parse.
pub fn parse_listing<T>(block: &[u8], parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    let text = String::from_utf8_lossy(block);
    text.lines()
        .filter(|line| *line != ".")
        .filter_map(|line| {
            let entry = parse(line);
            if entry.is_none() {
                tracing::debug!(line, "skipping unparsable listing line");
            }
            entry
        })
        .collect()
}

/// Returns the `<...>` timestamp of an APOP-capable greeting.
#[must_use]
pub fn apop_timestamp(greeting: &str) -> Option<&str> {
    let start = greeting.find('<')?;
    let len = greeting[start..].find('>')?;
    Some(&greeting[start..=start + len])
}

/// Hex MD5 of the greeting timestamp followed by the password.
#[must_use]
pub fn apop_digest(timestamp: &str, password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(32), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
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

    #[test]
    fn test_status_parse() {
        let ok = Status::parse(b"+OK 2 320\r\n");
        assert!(ok.ok);
        assert_eq!(ok.text, "2 320");

        let err = Status::parse(b"-ERR no such message\r\n");
        assert!(!err.ok);
        assert_eq!(err.text, "no such message");
        assert_eq!(err.to_line(), "-ERR no such message");

        let junk = Status::parse(b"* what\r\n");
        assert!(!junk.ok);
        assert_eq!(Status::parse(b"+OK\r\n").to_line(), "+OK");
    }

    #[test]
    fn test_block_complete() {
        assert!(!is_block_complete(b"+OK"));
        assert!(!is_block_complete(b"+OK list\r\n1 120\r\n"));
        assert!(is_block_complete(b"+OK list\r\n1 120\r\n.\r\n"));
        assert!(is_block_complete(b"+OK empty\r\n.\r\n"));
        assert!(is_block_complete(b"-ERR nope\r\n"));
        assert!(!is_block_complete(b"+OK\r\nline\r\n..\r\n"));
    }

    #[test]
    fn test_split_block() {
        let (status, block) = split_block(b"+OK 2 messages\r\n1 120\r\n2 200\r\n.\r\n");
        assert!(status.ok);
        assert_eq!(block, b"1 120\r\n2 200\r\n.\r\n");
    }

    #[test]
    fn test_stat_parse() {
        assert_eq!(Stat::parse("2 320"), Some(Stat { count: 2, size: 320 }));
        assert_eq!(Stat::parse("2"), None);
    }

    #[test]
    fn test_listings() {
        let list = parse_listing(b"1 120\r\n2 200\r\nbogus\r\n.\r\n", ListEntry::parse);
        assert_eq!(
            list,
            vec![
                ListEntry { number: 1, size: 120 },
                ListEntry { number: 2, size: 200 },
            ]
        );

        let uidl = parse_listing(b"1 whqtswO00WBw418f9t5JxYwZ\r\n.\r\n", UidlEntry::parse);
        assert_eq!(uidl[0].uid, "whqtswO00WBw418f9t5JxYwZ");
    }

    #[test]
    fn test_apop_rfc1939_example() {
        let greeting = "POP3 server ready <1896.697170952@dbc.mtview.ca.us>";
        let timestamp = apop_timestamp(greeting).unwrap();
        assert_eq!(timestamp, "<1896.697170952@dbc.mtview.ca.us>");
        assert_eq!(
            apop_digest(timestamp, "tanstaaf"),
            "c4c9334bac560ecc979e58001b3e22fb"
        );
        assert_eq!(apop_timestamp("POP3 ready"), None);
        assert_eq!(apop_timestamp("bad <unterminated"), None);
    }
}
