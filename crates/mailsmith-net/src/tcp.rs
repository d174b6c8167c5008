//! TCP sockets with optional TLS.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

use crate::error::{Error, Result};
use crate::socket::{Security, Socket};

const READ_BUFFER_SIZE: usize = 8192;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
enum NetStream {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// A [`Socket`] over TCP, optionally wrapped in TLS.
#[derive(Debug)]
pub struct TcpSocket {
    security: Security,
    connect_timeout: Option<Duration>,
    poll_interval: Duration,
    stream: Option<NetStream>,
    buffer: BytesMut,
}

impl TcpSocket {
    /// Creates an unconnected socket.
    #[must_use]
    pub fn new(security: Security) -> Self {
        Self {
            security,
            connect_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stream: None,
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// Limits how long `connect` may take.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets how long a single `receive` waits before reporting no data.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn open(&self, host: &str, port: u16) -> Result<NetStream> {
        let tcp = TcpStream::connect((host, port)).await?;
        match self.security {
            Security::None => Ok(NetStream::Tcp(tcp)),
            Security::Implicit => {
                let server_name = ServerName::try_from(host.to_string())
                    .map_err(|_| Error::InvalidDnsName(host.to_string()))?;
                let tls = create_tls_connector().connect(server_name, tcp).await?;
                Ok(NetStream::Tls(Box::new(tls)))
            }
        }
    }

    fn stream(&mut self) -> Result<&mut NetStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }
}

impl Socket for TcpSocket {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        tracing::debug!(host, port, security = ?self.security, "connecting");
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.open(host, port))
                .await
                .map_err(|_| Error::OperationTimedOut)??,
            None => self.open(host, port).await?,
        };
        self.stream = Some(stream);
        self.buffer.clear();
        Ok(())
    }

    async fn send(&mut self, data: &str) -> Result<()> {
        self.send_raw(data.as_bytes()).await
    }

    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        match self.stream()? {
            NetStream::Tcp(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
            NetStream::Tls(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Bytes> {
        let interval = self.poll_interval;
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.reserve(READ_BUFFER_SIZE);

        let read = match self.stream()? {
            NetStream::Tcp(stream) => tokio::time::timeout(interval, stream.read_buf(&mut buffer)).await,
            NetStream::Tls(stream) => tokio::time::timeout(interval, stream.read_buf(&mut buffer)).await,
        };

        let result = match read {
            Err(_elapsed) => Ok(Bytes::new()),
            Ok(Ok(0)) => {
                tracing::debug!("peer closed the connection");
                self.stream = None;
                Err(Error::ConnectionClosed)
            }
            Ok(Ok(_)) => Ok(buffer.split().freeze()),
            Ok(Err(e)) => Err(e.into()),
        };
        self.buffer = buffer;
        result
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        tracing::debug!("disconnecting");
        match stream {
            NetStream::Tcp(mut stream) => stream.shutdown().await?,
            NetStream::Tls(mut stream) => stream.shutdown().await?,
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Creates a TLS connector with the bundled web PKI roots.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
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
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_not_connected() {
        let mut socket = TcpSocket::new(Security::None);
        assert!(!socket.is_connected());
        assert!(matches!(socket.send("NOOP\r\n").await, Err(Error::NotConnected)));
        assert!(matches!(socket.receive().await, Err(Error::NotConnected)));
        socket.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_loopback_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"220 hello\r\n").await.unwrap();
            let mut line = [0u8; 6];
            stream.read_exact(&mut line).await.unwrap();
            line
        });

        let mut socket = TcpSocket::new(Security::None).poll_interval(Duration::from_millis(20));
        socket.connect("127.0.0.1", port).await.unwrap();
        assert!(socket.is_connected());

        let mut received = Vec::new();
        while !received.ends_with(b"\r\n") {
            received.extend_from_slice(&socket.receive().await.unwrap());
        }
        assert_eq!(received, b"220 hello\r\n");

        socket.send("QUIT\r\n").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"QUIT\r\n");

        // The server task has dropped its end.
        let mut closed = false;
        for _ in 0..50 {
            match socket.receive().await {
                Err(Error::ConnectionClosed) => {
                    closed = true;
                    break;
                }
                Ok(_) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(closed);
        assert!(!socket.is_connected());
    }
}
