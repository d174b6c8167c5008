//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or TLS failure.
    #[error("Network error: {0}")]
    Net(#[source] mailsmith_net::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The transport is already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// The server greeting (or HELO/EHLO) was refused.
    #[error("Connection greeting error: {0}")]
    ConnectionGreeting(String),

    /// The server rejected a command.
    #[error("{command} failed: {response}")]
    Command {
        /// The command verb (`MAIL`, `RCPT TO`, ...).
        command: String,
        /// The server response, or a reason.
        response: String,
    },

    /// Authentication was rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The timeout handler gave up waiting.
    #[error("Operation timed out")]
    OperationTimedOut,

    /// `send` was given no recipients.
    #[error("No recipient")]
    NoRecipient,

    /// `send` was given no expeditor.
    #[error("No expeditor")]
    NoExpeditor,

    /// Message handling failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailsmith_mime::Error),

    /// The server response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates a command error.
    #[must_use]
    pub fn command(command: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            response: response.into(),
        }
    }
}

impl From<mailsmith_net::Error> for Error {
    fn from(err: mailsmith_net::Error) -> Self {
        match err {
            mailsmith_net::Error::OperationTimedOut => Self::OperationTimedOut,
            mailsmith_net::Error::NotConnected => Self::NotConnected,
            other => Self::Net(other),
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

    #[test]
    fn test_timeout_maps_through() {
        let err = Error::from(mailsmith_net::Error::OperationTimedOut);
        assert!(matches!(err, Error::OperationTimedOut));
        let err = Error::from(mailsmith_net::Error::ConnectionClosed);
        assert!(matches!(err, Error::Net(mailsmith_net::Error::ConnectionClosed)));
    }

    #[test]
    fn test_command_display() {
        let err = Error::command("RCPT TO", "550 no such user");
        assert_eq!(err.to_string(), "RCPT TO failed: 550 no such user");
    }
}
