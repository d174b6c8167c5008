//! The receive loop shared by line-oriented protocol clients.

use crate::error::{Error, Result};
use crate::socket::Socket;
use crate::timeout::TimeoutHandler;

/// Reads from `socket` until `is_complete` accepts the accumulated bytes.
///
/// Before each receive the timeout handler, if any, is consulted; when it
/// reports a timeout and declines to keep waiting the read fails with
/// [`Error::OperationTimedOut`]. Empty receives yield to the runtime and
/// retry. Every chunk of data restarts the timeout clock.
///
/// # Errors
///
/// Returns socket errors and [`Error::OperationTimedOut`].
pub async fn read_response<S, F>(
    socket: &mut S,
    mut timeout: Option<&mut dyn TimeoutHandler>,
    is_complete: F,
) -> Result<Vec<u8>>
where
    S: Socket,
    F: Fn(&[u8]) -> bool + Send,
{
    let mut response = Vec::new();
    if let Some(handler) = timeout.as_deref_mut() {
        handler.reset_timeout();
    }

    loop {
        if let Some(handler) = timeout.as_deref_mut() {
            if handler.is_timed_out() {
                if !handler.handle_timeout() {
                    return Err(Error::OperationTimedOut);
                }
                handler.reset_timeout();
            }
        }

        let chunk = socket.receive().await?;
        if chunk.is_empty() {
            tokio::task::yield_now().await;
            continue;
        }

        if let Some(handler) = timeout.as_deref_mut() {
            handler.reset_timeout();
        }
        response.extend_from_slice(&chunk);
        if is_complete(&response) {
            tracing::trace!(bytes = response.len(), "response complete");
            return Ok(response);
        }
    }
}

/// Returns true if `buffer` ends with a line break.
#[must_use]
pub fn ends_with_line(buffer: &[u8]) -> bool {
    buffer.last() == Some(&b'\n')
}

/// Returns the last complete line of `buffer`, without its line break.
#[must_use]
pub fn last_line(buffer: &[u8]) -> Option<&[u8]> {
    let body = buffer.strip_suffix(b"\n")?;
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    let start = body.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    Some(&body[start..])
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
    fn test_last_line() {
        assert_eq!(last_line(b"250-a\r\n250 b\r\n"), Some(&b"250 b"[..]));
        assert_eq!(last_line(b"single\n"), Some(&b"single"[..]));
        assert_eq!(last_line(b"partial"), None);
        assert_eq!(last_line(b"\r\n"), Some(&b""[..]));
    }

    #[test]
    fn test_ends_with_line() {
        assert!(ends_with_line(b"x\r\n"));
        assert!(!ends_with_line(b"x\r"));
        assert!(!ends_with_line(b""));
    }

    use crate::mock::ScriptedSocket;
    use crate::timeout::DefaultTimeoutHandler;
    use std::time::Duration;

    /// Never times out until told to; counts how often it was asked.
    struct CountingHandler {
        expired: bool,
        keep_waiting: bool,
        resets: usize,
    }

    impl TimeoutHandler for CountingHandler {
        fn is_timed_out(&self) -> bool {
            self.expired
        }

        fn handle_timeout(&mut self) -> bool {
            self.expired = false;
            self.keep_waiting
        }

        fn reset_timeout(&mut self) {
            self.resets += 1;
        }
    }

    async fn connected(chunks: &[&[u8]]) -> ScriptedSocket {
        let mut socket = ScriptedSocket::new(chunks.iter().copied());
        socket.connect("mock", 1).await.unwrap();
        socket
    }

    #[tokio::test]
    async fn test_reads_across_chunks_and_empty_polls() {
        let mut socket = connected(&[b"250-first\r\n", b"", b"250 la", b"st\r\n"]).await;
        let response = read_response(&mut socket, None, |buf| {
            last_line(buf).is_some_and(|line| line.get(3) == Some(&b' '))
        })
        .await
        .unwrap();
        assert_eq!(response, b"250-first\r\n250 last\r\n");
    }

    #[tokio::test]
    async fn test_timeout_declined() {
        let mut socket = connected(&[b"", b"", b"never"]).await;
        let mut handler = DefaultTimeoutHandler::new(Duration::ZERO);
        let result = read_response(&mut socket, Some(&mut handler), ends_with_line).await;
        assert!(matches!(result, Err(Error::OperationTimedOut)));
    }

    #[tokio::test]
    async fn test_timeout_extended() {
        let mut socket = connected(&[b"+OK\r\n"]).await;
        let mut handler = CountingHandler {
            expired: true,
            keep_waiting: true,
            resets: 0,
        };
        let response = read_response(&mut socket, Some(&mut handler), ends_with_line)
            .await
            .unwrap();
        assert_eq!(response, b"+OK\r\n");
        // start, after the extension, after data
        assert_eq!(handler.resets, 3);
    }

    #[tokio::test]
    async fn test_closed_connection() {
        let mut socket = connected(&[b"partial"]).await;
        let result = read_response(&mut socket, None, ends_with_line).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
