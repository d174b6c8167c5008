//! Top-level messages.

use std::ops::{Deref, DerefMut};

use crate::datetime::DateTime;
use crate::field::{FieldValue, HeaderField};
use crate::mailbox::{Mailbox, MailboxList};
use crate::part::BodyPart;
use crate::session::{Config, Session};
use crate::text::Text;

/// A message: the root part of a tree plus header conveniences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    part: BodyPart,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a message with the default configuration.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        Self::parse_with(&Config::default(), bytes)
    }

    /// Parses a message.
    #[must_use]
    pub fn parse_with(config: &Config, bytes: &[u8]) -> Self {
        let (part, _) = BodyPart::parse(config, bytes, 0, bytes.len());
        tracing::trace!(parts = part.len(), bytes = bytes.len(), "parsed message");
        Self { part }
    }

    /// Generates the message as CRLF-terminated bytes.
    #[must_use]
    pub fn generate(&self, max_line_length: usize) -> Vec<u8> {
        self.part.generate(max_line_length)
    }

    /// Generates the message, folding at the configured line length.
    #[must_use]
    pub fn generate_with(&self, config: &Config) -> Vec<u8> {
        self.generate(config.max_line_length)
    }

    /// Returns the underlying tree.
    #[must_use]
    pub fn into_part(self) -> BodyPart {
        self.part
    }

    fn field(&self, name: &str) -> Option<&HeaderField> {
        self.header().find(name).ok().filter(|field| field.is_parsed())
    }

    fn mailbox_list(&self, name: &str) -> Option<&MailboxList> {
        self.field(name).and_then(|field| field.as_mailbox_list().ok())
    }

    /// The `From` mailboxes.
    #[must_use]
    pub fn from(&self) -> Option<&MailboxList> {
        self.mailbox_list("From")
    }

    /// The `To` mailboxes.
    #[must_use]
    pub fn to(&self) -> Option<&MailboxList> {
        self.mailbox_list("To")
    }

    /// The `Cc` mailboxes.
    #[must_use]
    pub fn cc(&self) -> Option<&MailboxList> {
        self.mailbox_list("Cc")
    }

    /// The `Bcc` mailboxes.
    #[must_use]
    pub fn bcc(&self) -> Option<&MailboxList> {
        self.mailbox_list("Bcc")
    }

    /// The `Subject` text.
    #[must_use]
    pub fn subject(&self) -> Option<&Text> {
        self.field("Subject").and_then(|field| field.as_text().ok())
    }

    /// The `Date`, if present and understood.
    #[must_use]
    pub fn date(&self) -> Option<&DateTime> {
        self.field("Date").and_then(|field| field.as_date().ok())
    }

    /// The `Message-ID` value as written.
    #[must_use]
    pub fn message_id(&self) -> Option<String> {
        self.header()
            .find("Message-ID")
            .ok()
            .map(HeaderField::raw_text)
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.field("Message-ID")
                    .and_then(|field| field.as_text().ok())
                    .map(Text::to_string_lossy)
            })
    }

    /// The sender: the first `From` mailbox, else the first `Sender`.
    #[must_use]
    pub fn expeditor(&self) -> Option<&Mailbox> {
        self.from()
            .and_then(MailboxList::first)
            .or_else(|| self.mailbox_list("Sender").and_then(MailboxList::first))
            .filter(|mailbox| !mailbox.email().is_empty())
    }

    /// Every `To`, `Cc` and `Bcc` mailbox, in that order.
    #[must_use]
    pub fn recipients(&self) -> MailboxList {
        let mut recipients = MailboxList::new();
        for list in [self.to(), self.cc(), self.bcc()].into_iter().flatten() {
            recipients.extend(list);
        }
        recipients
    }

    /// Sets a mailbox-list field such as `From` or `To`.
    pub fn set_mailboxes(&mut self, name: &str, mailboxes: MailboxList) {
        self.header_mut()
            .set(HeaderField::new(name, FieldValue::MailboxList(mailboxes)));
    }

    /// Sets the `Subject`.
    pub fn set_subject(&mut self, subject: &str) {
        self.header_mut().set(HeaderField::text("Subject", subject));
    }

    /// Sets the `Date`.
    pub fn set_date(&mut self, date: DateTime) {
        self.header_mut()
            .set(HeaderField::new("Date", FieldValue::Date(date)));
    }

    /// Sets a fresh `Message-ID` for `host`.
    pub fn set_message_id(&mut self, session: &mut Session, host: &str) {
        let id = session.generate_message_id(host);
        self.header_mut().set(HeaderField::text("Message-ID", &id));
    }
}

impl From<BodyPart> for Message {
    fn from(part: BodyPart) -> Self {
        Self { part }
    }
}

impl Deref for Message {
    type Target = BodyPart;

    fn deref(&self) -> &Self::Target {
        &self.part
    }
}

impl DerefMut for Message {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.part
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
    use crate::text::line_length;
    use chrono::Datelike;

    const RAW: &str = "Return-Path: <bounce@example.org>\r\n\
        Received: from mx.example.org by mail.example.com with ESMTP id 42; Tue, 1 Jul 2003 10:52:37 +0200\r\n\
        From: \"Jane Doe\" <jane@example.org>\r\n\
        To: bob@example.com, Carol <carol@example.com>\r\n\
        Cc: dave@example.com\r\n\
        Subject: =?iso-8859-1?Q?caf=E9?= menu\r\n\
        Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
        Message-ID: <1234@example.org>\r\n\
        \r\n\
        Hello.\r\n";

    #[test]
    fn test_accessors() {
        let message = Message::parse(RAW.as_bytes());
        assert_eq!(message.expeditor().unwrap().email(), "jane@example.org");
        assert_eq!(message.to().unwrap().len(), 2);
        assert_eq!(message.subject().unwrap().decoded().unwrap(), "café menu");
        assert_eq!(message.date().unwrap().value().unwrap().year(), 2003);
        assert_eq!(message.message_id().unwrap(), "<1234@example.org>");
        assert!(message.bcc().is_none());
    }

    #[test]
    fn test_recipients_in_order() {
        let message = Message::parse(RAW.as_bytes());
        let recipients = message.recipients();
        let emails: Vec<&str> = recipients.iter().map(Mailbox::email).collect();
        assert_eq!(emails, ["bob@example.com", "carol@example.com", "dave@example.com"]);
    }

    #[test]
    fn test_expeditor_falls_back_to_sender() {
        let message = Message::parse(b"Sender: s@example.com\r\n\r\n");
        assert_eq!(message.expeditor().unwrap().email(), "s@example.com");
        assert!(Message::parse(b"Subject: x\r\n\r\n").expeditor().is_none());
    }

    #[test]
    fn test_round_trip() {
        let message = Message::parse(RAW.as_bytes());
        let out = message.generate(line_length::RECOMMENDED);
        assert_eq!(Message::parse(&out), message);
    }

    #[test]
    fn test_generate_with_configured_line_length() {
        let mut message = Message::new();
        message.set_subject("minutes of the weekly planning meeting held on the third floor");

        let unfolded = message.generate_with(&Config::default());
        assert!(String::from_utf8(unfolded).unwrap().lines().all(|line| !line.starts_with(' ')));

        let config = Config::builder().max_line_length(40).build();
        let out = String::from_utf8(message.generate_with(&config)).unwrap();
        let subject: Vec<&str> = out
            .split("\r\n")
            .skip_while(|line| !line.starts_with("Subject:"))
            .take_while(|line| !line.is_empty())
            .collect();
        assert!(subject.len() > 1);
        assert!(subject.iter().all(|line| line.len() <= 40), "{subject:?}");
        assert_eq!(
            Message::parse(out.as_bytes()).subject().unwrap().decoded().unwrap(),
            "minutes of the weekly planning meeting held on the third floor"
        );
    }

    #[test]
    fn test_setters() {
        let mut session = Session::with_seed(Config::default(), 5);
        let mut message = Message::new();
        message.set_mailboxes("From", Mailbox::new("me@example.com").into());
        message.set_subject("Grüße");
        message.set_message_id(&mut session, "example.com");

        let out = message.generate(line_length::RECOMMENDED);
        let again = Message::parse(&out);
        assert_eq!(again.expeditor().unwrap().email(), "me@example.com");
        assert_eq!(again.subject().unwrap().decoded().unwrap(), "Grüße");
        assert!(again.message_id().unwrap().ends_with("@example.com>"));
    }
}
