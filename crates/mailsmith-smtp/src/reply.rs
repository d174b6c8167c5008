//! SMTP replies and their parser.

use mailsmith_net::last_line;

use crate::error::{Error, Result};

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply text, one entry per line, without the code prefix.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Parses a complete reply as read from the wire.
    ///
    /// Single: `250 OK\r\n`. Multi: `250-First\r\n250 Last\r\n`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the reply is empty or a line lacks a
    /// numeric code.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(buffer);
        let lines: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
        let first = lines
            .first()
            .ok_or_else(|| Error::Protocol("Empty reply".into()))?;

        let code = first
            .get(..3)
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| Error::Protocol(format!("Invalid reply code: {first}")))?;

        let mut message = Vec::with_capacity(lines.len());
        for line in &lines {
            match line.get(3..4) {
                None if line.len() == 3 => message.push(String::new()),
                Some(" " | "-") => message.push(line[4..].to_string()),
                _ => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
            }
        }

        Ok(Self::new(ReplyCode::new(code), message))
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the reply as one line: the code followed by its text.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{} {}", self.code, self.message.join(" "))
    }
}

/// Returns true once `buffer` holds a whole reply: it ends with a line
/// break and its last line is not a `NNN-` continuation.
#[must_use]
pub fn is_reply_complete(buffer: &[u8]) -> bool {
    last_line(buffer).is_some_and(|line| line.get(3) != Some(&b'-'))
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);

    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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

    #[test]
    fn test_parse_single_line_reply() {
        let reply = Reply::parse(b"250 OK\r\n").unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = Reply::parse(b"250-mx.example.com\r\n250-SIZE 100\r\n250 AUTH CRAM-MD5\r\n")
            .unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.message,
            vec!["mx.example.com", "SIZE 100", "AUTH CRAM-MD5"]
        );
        assert_eq!(reply.to_line(), "250 mx.example.com SIZE 100 AUTH CRAM-MD5");
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = Reply::parse(b"354\r\n").unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Reply::parse(b"").is_err());
        assert!(Reply::parse(b"25\r\n").is_err());
        assert!(Reply::parse(b"ABC OK\r\n").is_err());
        assert!(Reply::parse(b"250xOK\r\n").is_err());
    }

    #[test]
    fn test_reply_complete() {
        assert!(is_reply_complete(b"250 OK\r\n"));
        assert!(is_reply_complete(b"250-a\r\n250 b\r\n"));
        assert!(is_reply_complete(b"354\r\n"));
        assert!(!is_reply_complete(b"250-a\r\n"));
        assert!(!is_reply_complete(b"250-a\r\n250 b"));
        assert!(!is_reply_complete(b""));
    }

    #[test]
    fn test_reply_code_classes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::AUTH_SUCCESS.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(!ReplyCode::new(550).is_success());
        assert_eq!(format!("{}", ReplyCode::SERVICE_READY), "220");
        assert!(ReplyCode::OK < ReplyCode::new(550));
    }
}
