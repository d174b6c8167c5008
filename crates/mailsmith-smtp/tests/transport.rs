//! End-to-end SMTP dialogues against scripted and loopback servers.

#![allow(clippy::unwrap_used)]

use mailsmith_mime::{Mailbox, MailboxList, Message};
use mailsmith_net::mock::ScriptedSocket;
use mailsmith_net::unstuff;
use mailsmith_smtp::{Config, Error, SmtpTransport};
use proptest::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HANDSHAKE: [&str; 2] = ["220 mx.example.com ESMTP\r\n", "250 mx.example.com\r\n"];

fn config() -> Config {
    Config::builder("mx.example.com").timeout(None).build()
}

fn scripted(replies: &[&str]) -> SmtpTransport<ScriptedSocket> {
    let script = HANDSHAKE.iter().chain(replies).copied();
    SmtpTransport::new(config(), ScriptedSocket::new(script))
}

fn one(email: &str) -> MailboxList {
    MailboxList::from(Mailbox::new(email))
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsmith_smtp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[tokio::test]
async fn test_send_stuffs_leading_dots() {
    init_tracing();
    let mut smtp = scripted(&["250 ok\r\n", "250 ok\r\n", "354 go ahead\r\n", "250 queued\r\n"]);
    let sent = smtp.socket().sent();
    smtp.connect().await.unwrap();

    smtp.send(
        &Mailbox::new("alice@example.com"),
        &one("bob@example.com"),
        b"Subject: hi\r\n\r\n.leading dot\r\nbody",
    )
    .await
    .unwrap();

    assert_eq!(
        sent.text(),
        "EHLO localhost\r\n\
         MAIL FROM:<alice@example.com>\r\n\
         RCPT TO:<bob@example.com>\r\n\
         DATA\r\n\
         Subject: hi\r\n\r\n..leading dot\r\nbody\r\n.\r\n"
    );
    assert!(smtp.is_connected());
}

#[tokio::test]
async fn test_send_checks_arguments_before_connection() {
    let mut smtp = scripted(&[]);
    let none = MailboxList::new();

    let result = smtp
        .send(&Mailbox::new("alice@example.com"), &none, b"x")
        .await;
    assert!(matches!(result, Err(Error::NoRecipient)));

    let result = smtp
        .send(&Mailbox::new(""), &one("bob@example.com"), b"x")
        .await;
    assert!(matches!(result, Err(Error::NoExpeditor)));

    let result = smtp
        .send(&Mailbox::new("alice@example.com"), &one("bob@example.com"), b"x")
        .await;
    assert!(matches!(result, Err(Error::NotConnected)));
}

#[tokio::test]
async fn test_rejected_recipient_aborts() {
    let mut smtp = scripted(&["250 ok\r\n", "550 no such user\r\n"]);
    let sent = smtp.socket().sent();
    smtp.connect().await.unwrap();

    let err = smtp
        .send(
            &Mailbox::new("alice@example.com"),
            &one("nobody@example.com"),
            b"body\r\n",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Command { ref command, ref response }
            if command == "RCPT TO" && response == "550 no such user"
    ));
    assert!(!smtp.is_connected());
    assert!(sent.text().ends_with("QUIT\r\n"));
    assert!(!sent.text().contains("DATA"));
}

#[tokio::test]
async fn test_send_message_uses_headers() {
    let message = Message::parse(
        b"From: Alice <alice@example.com>\r\n\
          To: bob@example.com\r\n\
          Cc: carol@example.com\r\n\
          Subject: lunch\r\n\
          \r\n\
          Noon?\r\n",
    );
    let mut smtp = scripted(&[
        "250 ok\r\n",
        "250 ok\r\n",
        "250 ok\r\n",
        "354 go ahead\r\n",
        "250 queued\r\n",
    ]);
    let sent = smtp.socket().sent();
    smtp.connect().await.unwrap();
    smtp.send_message(&message).await.unwrap();

    let text = sent.text();
    assert!(text.contains("MAIL FROM:<alice@example.com>\r\n"));
    let bob = text.find("RCPT TO:<bob@example.com>").unwrap();
    let carol = text.find("RCPT TO:<carol@example.com>").unwrap();
    assert!(bob < carol);
    assert!(text.contains("Subject: lunch\r\n"));
    assert!(text.ends_with("Noon?\r\n.\r\n"));
}

#[tokio::test]
async fn test_send_message_folds_at_configured_length() {
    let mut message = Message::new();
    message.set_mailboxes("From", Mailbox::new("alice@example.com").into());
    message.set_mailboxes("To", Mailbox::new("bob@example.com").into());
    message.set_subject("notes from the quarterly review of the storage cluster rollout");

    let mime = mailsmith_mime::Config::builder().max_line_length(40).build();
    let mut smtp = scripted(&["250 ok\r\n", "250 ok\r\n", "354 go ahead\r\n", "250 queued\r\n"])
        .with_mime_config(mime);
    let sent = smtp.socket().sent();
    smtp.connect().await.unwrap();
    smtp.send_message(&message).await.unwrap();

    let text = sent.text();
    let data = &text[text.find("DATA\r\n").unwrap() + 6..];
    let subject: Vec<&str> = data
        .split("\r\n")
        .skip_while(|line| !line.starts_with("Subject:"))
        .take_while(|line| line.starts_with("Subject:") || line.starts_with(' '))
        .collect();
    assert!(subject.len() > 1);
    assert!(subject.iter().all(|line| line.len() <= 40), "{subject:?}");
}

#[tokio::test]
async fn test_send_message_without_from() {
    let message = Message::parse(b"To: bob@example.com\r\n\r\nhi\r\n");
    let mut smtp = scripted(&[]);
    let result = smtp.send_message(&message).await;
    assert!(matches!(result, Err(Error::NoExpeditor)));
}

#[tokio::test]
async fn test_multiline_replies_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"220-mx.test\r\n220 welcome\r\n").await.unwrap();
        let ehlo = lines.next_line().await.unwrap().unwrap();
        write
            .write_all(b"250-mx.test\r\n250-SIZE 2048\r\n")
            .await
            .unwrap();
        write.write_all(b"250 8BITMIME\r\n").await.unwrap();
        let noop = lines.next_line().await.unwrap().unwrap();
        write.write_all(b"250 ok\r\n").await.unwrap();
        let quit = lines.next_line().await.unwrap().unwrap();
        (ehlo, noop, quit)
    });

    let config = Config::builder("127.0.0.1")
        .port(port)
        .client_hostname("client.test")
        .build();
    let mut smtp = SmtpTransport::from_config(config);
    smtp.connect().await.unwrap();
    assert_eq!(smtp.server_info().max_message_size(), Some(2048));
    smtp.noop().await.unwrap();
    smtp.disconnect().await.unwrap();

    let (ehlo, noop, quit) = server.await.unwrap();
    assert_eq!(ehlo, "EHLO client.test");
    assert_eq!(noop, "NOOP");
    assert_eq!(quit, "QUIT");
}

proptest! {
    #[test]
    fn prop_data_on_wire_unstuffs_to_message(lines in prop::collection::vec("[.a-z ]{0,20}", 1..12)) {
        let mut data = lines.join("\r\n").into_bytes();
        data.extend_from_slice(b"\r\n");

        let sent = tokio_test::block_on(async {
            let mut smtp = scripted(&["250 ok\r\n", "250 ok\r\n", "354 go\r\n", "250 ok\r\n"]);
            let sent = smtp.socket().sent();
            smtp.connect().await.unwrap();
            smtp.send(&Mailbox::new("a@x"), &one("b@y"), &data).await.unwrap();
            sent.bytes()
        });

        let marker = b"DATA\r\n";
        let start = sent
            .windows(marker.len())
            .position(|window| window == marker)
            .unwrap()
            + marker.len();
        prop_assert_eq!(unstuff(&sent[start..]), data);
    }
}
