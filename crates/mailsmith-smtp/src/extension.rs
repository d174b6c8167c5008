//! ESMTP capabilities advertised in the EHLO reply.

use std::collections::HashSet;

/// One capability line from the EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS
    StartTls,
    /// AUTH with the mechanisms this client understands
    Auth(Vec<AuthMechanism>),
    /// SIZE, with the advertised limit if any
    Size(Option<usize>),
    /// 8BITMIME
    EightBitMime,
    /// PIPELINING
    Pipelining,
    /// SMTPUTF8
    SmtpUtf8,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl Extension {
    /// Parses a capability line (without the `250-` prefix).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(keyword) = words.next() else {
            return Self::Unknown(line.to_string());
        };

        match keyword.to_ascii_uppercase().as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(words.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(words.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN
    Plain,
    /// LOGIN
    Login,
    /// CRAM-MD5 challenge-response
    CramMd5,
}

impl AuthMechanism {
    /// Parses a mechanism name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            _ => None,
        }
    }

    /// Returns the mechanism name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
        }
    }
}

/// What the server told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from the greeting.
    pub hostname: String,
    /// True if the server accepted EHLO.
    pub extended: bool,
    /// Capabilities from the EHLO reply.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns the advertised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
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
    fn parse_keywords_case_insensitively() {
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
        assert_eq!(Extension::parse("Pipelining"), Extension::Pipelining);
        assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
    }

    #[test]
    fn parse_auth_skips_unknown_mechanisms() {
        assert_eq!(
            Extension::parse("AUTH PLAIN XOAUTH2 cram-md5"),
            Extension::Auth(vec![AuthMechanism::Plain, AuthMechanism::CramMd5])
        );
    }

    #[test]
    fn parse_size() {
        assert_eq!(Extension::parse("SIZE 35882577"), Extension::Size(Some(35882577)));
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
    }

    #[test]
    fn parse_unknown_and_empty() {
        assert_eq!(
            Extension::parse("X-CUSTOM arg"),
            Extension::Unknown("X-CUSTOM arg".to_string())
        );
        assert!(matches!(Extension::parse(""), Extension::Unknown(_)));
    }

    #[test]
    fn server_info_queries() {
        let info = ServerInfo {
            hostname: "mx.example.com".to_string(),
            extended: true,
            extensions: [
                Extension::Size(Some(1024)),
                Extension::Auth(vec![AuthMechanism::CramMd5]),
                Extension::Pipelining,
            ]
            .into_iter()
            .collect(),
        };
        assert!(info.supports(&Extension::Pipelining));
        assert!(!info.supports(&Extension::StartTls));
        assert_eq!(info.max_message_size(), Some(1024));
        assert_eq!(info.auth_mechanisms(), vec![AuthMechanism::CramMd5]);
        assert!(ServerInfo::default().auth_mechanisms().is_empty());
    }
}
