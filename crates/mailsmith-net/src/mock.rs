//! A scripted in-memory socket for protocol tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::socket::Socket;

/// Shared record of everything a [`ScriptedSocket`] was sent.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<u8>>>);

impl SentLog {
    /// Returns a copy of the bytes sent so far.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the bytes sent so far as lossy text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    fn append(&self, data: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
    }
}

/// A socket that replays server chunks in order and records what it is sent.
///
/// An empty chunk is delivered as "no data yet". Once the script runs out,
/// `receive` reports the connection as closed.
#[derive(Debug, Default)]
pub struct ScriptedSocket {
    script: VecDeque<Bytes>,
    sent: SentLog,
    connected: bool,
    refuse: bool,
    last_host: Option<(String, u16)>,
}

impl ScriptedSocket {
    /// Creates a socket that will deliver `chunks` in order.
    #[must_use]
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            script: chunks
                .into_iter()
                .map(|chunk| Bytes::copy_from_slice(chunk.as_ref()))
                .collect(),
            ..Self::default()
        }
    }

    /// Creates a socket whose `connect` always fails.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Returns a handle to the sent-bytes log.
    #[must_use]
    pub fn sent(&self) -> SentLog {
        self.sent.clone()
    }

    /// Returns the last host and port passed to `connect`.
    #[must_use]
    pub fn last_host(&self) -> Option<(&str, u16)> {
        self.last_host.as_ref().map(|(host, port)| (host.as_str(), *port))
    }
}

impl Socket for ScriptedSocket {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.last_host = Some((host.to_string(), port));
        if self.refuse {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, data: &str) -> Result<()> {
        self.send_raw(data.as_bytes()).await
    }

    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sent.append(data);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        match self.script.pop_front() {
            Some(chunk) => Ok(chunk),
            None => {
                self.connected = false;
                Err(Error::ConnectionClosed)
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
