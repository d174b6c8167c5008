//! Retrieval dialogues against a scripted server.

#![allow(clippy::unwrap_used)]

use mailsmith_net::mock::ScriptedSocket;
use mailsmith_pop3::{Config, Error, Pop3Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOGIN: [&str; 3] = ["+OK POP3 ready\r\n", "+OK\r\n", "+OK\r\n"];

fn store(replies: &[&str]) -> Pop3Store<ScriptedSocket> {
    let config = Config::builder("pop.example.com", "user", "secret")
        .timeout(None)
        .build();
    let script = LOGIN.iter().chain(replies).copied();
    Pop3Store::new(config, ScriptedSocket::new(script))
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsmith_pop3=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[tokio::test]
async fn test_retrieve_unstuffs_and_parses() {
    init_tracing();
    let mut pop = store(&[
        "+OK 120 octets\r\n\
         From: Alice <alice@example.com>\r\n\
         To: bob@example.com\r\n\
         Subject: dots\r\n\
         \r\n\
         ..hidden line\r\n",
        "last line\r\n.\r\n",
    ]);
    pop.connect().await.unwrap();

    let raw = pop.retrieve_raw(1).await;
    let raw = raw.unwrap();
    assert!(raw.ends_with(b"\r\n.hidden line\r\nlast line\r\n"));

    let message = mailsmith_mime::Message::parse(&raw);
    assert_eq!(message.subject().unwrap().to_string_lossy(), "dots");
    assert_eq!(message.expeditor().unwrap().email(), "alice@example.com");
}

#[tokio::test]
async fn test_retrieve_message() {
    let mut pop = store(&["+OK\r\nSubject: hi\r\n\r\nbody\r\n.\r\n"]);
    let sent = pop.socket().sent();
    pop.connect().await.unwrap();

    let message = pop.retrieve(3).await.unwrap();
    assert_eq!(message.subject().unwrap().to_string_lossy(), "hi");
    assert_eq!(message.body().contents(), b"body\r\n");
    assert!(sent.text().ends_with("RETR 3\r\n"));
}

#[tokio::test]
async fn test_top_returns_header_only() {
    let mut pop = store(&[
        "+OK\r\nFrom: carol@example.com\r\nSubject: quick\r\n\r\n.\r\n",
        "+OK\r\n",
    ]);
    let sent = pop.socket().sent();
    pop.connect().await.unwrap();

    let header = pop.header(7).await.unwrap();
    assert_eq!(header.len(), 2);
    assert!(header.has("subject"));
    pop.disconnect().await.unwrap();
    assert!(sent.text().contains("TOP 7 0\r\n"));
    assert!(sent.text().ends_with("QUIT\r\n"));
}

#[tokio::test]
async fn test_retrieve_missing_message() {
    let mut pop = store(&["-ERR no such message\r\n"]);
    pop.connect().await.unwrap();

    let err = pop.retrieve(42).await.unwrap_err();
    assert!(matches!(err, Error::Command { ref command, .. } if command == "RETR"));
    assert!(!pop.is_connected());
}

#[tokio::test]
async fn test_dele_rset_noop() {
    let mut pop = store(&["+OK deleted\r\n", "+OK reset\r\n", "+OK\r\n"]);
    let sent = pop.socket().sent();
    pop.connect().await.unwrap();

    pop.delete(1).await.unwrap();
    pop.reset().await.unwrap();
    pop.noop().await.unwrap();
    assert!(sent.text().ends_with("DELE 1\r\nRSET\r\nNOOP\r\n"));
    assert!(pop.is_connected());
}

#[tokio::test]
async fn test_connection_lost_mid_block() {
    let mut pop = store(&["+OK\r\npartial\r\n"]);
    pop.connect().await.unwrap();

    let err = pop.retrieve_raw(1).await.unwrap_err();
    assert!(matches!(err, Error::Net(mailsmith_net::Error::ConnectionClosed)));
    assert!(!pop.is_connected());
}
