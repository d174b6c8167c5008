//! Error types for POP3 operations.

use std::io;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or TLS failure.
    #[error("Network error: {0}")]
    Net(#[source] mailsmith_net::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The store is already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// The server greeting was not `+OK`.
    #[error("Connection greeting error: {0}")]
    ConnectionGreeting(String),

    /// `USER`/`PASS` or `APOP` was refused.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The server answered `-ERR`.
    #[error("{command} failed: {response}")]
    Command {
        /// The command verb.
        command: String,
        /// The server response.
        response: String,
    },

    /// The timeout handler gave up waiting.
    #[error("Operation timed out")]
    OperationTimedOut,

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
