//! The socket abstraction protocol clients are written against.

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

/// Transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plain TCP.
    #[default]
    None,
    /// TLS from the first byte.
    Implicit,
}

/// A byte-oriented connection.
///
/// `receive` never blocks indefinitely: an empty result means no data has
/// arrived yet and the caller should poll again.
pub trait Socket: Send {
    /// Connects to `host:port`.
    fn connect(&mut self, host: &str, port: u16) -> impl Future<Output = Result<()>> + Send;

    /// Sends a text line or command.
    fn send(&mut self, data: &str) -> impl Future<Output = Result<()>> + Send;

    /// Sends raw bytes.
    fn send_raw(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Returns whatever bytes are available, possibly none.
    fn receive(&mut self) -> impl Future<Output = Result<Bytes>> + Send;

    /// Closes the connection. Closing a closed socket is not an error.
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Returns true while connected.
    fn is_connected(&self) -> bool;
}
