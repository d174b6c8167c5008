//! Error types for socket operations.

use std::io;

/// Result type alias for socket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Socket error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The host name is not a valid TLS server name.
    #[error("Invalid hostname: {0}")]
    InvalidDnsName(String),

    /// The socket is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The timeout handler gave up waiting.
    #[error("Operation timed out")]
    OperationTimedOut,

    /// The peer closed the connection.
    #[error("Connection closed by peer")]
    ConnectionClosed,
}
