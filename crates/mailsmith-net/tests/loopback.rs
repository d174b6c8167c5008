//! Integration tests for the TCP socket against a local listener.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use mailsmith_net::{
    DefaultTimeoutHandler, Error, Security, Socket, TcpSocket, ends_with_line, read_response,
};

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn test_read_response_over_tcp() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"+OK ready").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        stream.write_all(b"\r\n").await.unwrap();
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink).await;
    });

    let mut socket = TcpSocket::new(Security::None).poll_interval(Duration::from_millis(10));
    socket.connect("127.0.0.1", port).await.unwrap();

    let mut timeout = DefaultTimeoutHandler::new(Duration::from_secs(5));
    let response = read_response(&mut socket, Some(&mut timeout), ends_with_line)
        .await
        .unwrap();
    assert_eq!(response, b"+OK ready\r\n");
    socket.disconnect().await.unwrap();
    assert!(!socket.is_connected());
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let (listener, port) = listener().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink).await;
    });

    let mut socket = TcpSocket::new(Security::None).poll_interval(Duration::from_millis(10));
    socket.connect("127.0.0.1", port).await.unwrap();

    let mut timeout = DefaultTimeoutHandler::new(Duration::from_millis(50));
    let result = read_response(&mut socket, Some(&mut timeout), ends_with_line).await;
    assert!(matches!(result, Err(Error::OperationTimedOut)));
}

#[tokio::test]
async fn test_connect_refused() {
    let (listener, port) = listener().await;
    drop(listener);

    let mut socket = TcpSocket::new(Security::None);
    let result = socket.connect("127.0.0.1", port).await;
    assert!(matches!(result, Err(Error::Io(_))));
    assert!(!socket.is_connected());
}
