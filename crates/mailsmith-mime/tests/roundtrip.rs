//! Parse/generate round trips across the public API.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use mailsmith_mime::{
    BodyPart, Charset, Config, Error, FieldKind, Message, PartId, Relay, charset, line_length,
};

const DATE: &str = "Tue, 1 Jul 2003 10:52:37 +0200";

fn word() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,10}"
}

fn phrase() -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 1..8).prop_map(|words| words.join(" "))
}

fn relay_value() -> impl Strategy<Value = String> {
    // Leading `x` keeps values from reading as keywords.
    "x[a-z0-9.]{0,8}"
}

fn build_message(subject: &str, bodies: &[String]) -> String {
    let mut raw = format!(
        "From: sender@example.com\r\n\
         To: a@example.com, B <b@example.com>\r\n\
         Subject: {subject}\r\n\
         Date: {DATE}\r\n\
         Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
         \r\n"
    );
    for body in bodies {
        raw.push_str("--sep\r\nContent-Type: text/plain; charset=us-ascii\r\n\r\n");
        raw.push_str(body);
        raw.push_str("\r\n");
    }
    raw.push_str("--sep--\r\n");
    raw
}

proptest! {
    #[test]
    fn generate_then_parse_is_equivalent(
        subject in phrase(),
        bodies in prop::collection::vec(phrase(), 1..5),
        max in prop_oneof![Just(line_length::RECOMMENDED), Just(line_length::INFINITE)],
    ) {
        let raw = build_message(&subject, &bodies);
        let message = Message::parse(raw.as_bytes());
        let generated = message.generate(max);
        let again = Message::parse(&generated);

        prop_assert_eq!(&again, &message);
        prop_assert_eq!(again.subject().unwrap().decoded().unwrap(), subject);

        let children = again.children(PartId::ROOT).unwrap();
        prop_assert_eq!(children.len(), bodies.len());
        for (&id, body) in children.iter().zip(&bodies) {
            prop_assert_eq!(&again.part(id).unwrap().text().unwrap(), body);
        }
    }

    #[test]
    fn relay_reorders_to_canonical(
        from in relay_value(),
        by in relay_value(),
        id in relay_value(),
        recipient in relay_value(),
        with in prop::collection::vec(relay_value(), 1..4),
        order in Just(vec![0usize, 1, 2, 3, 4]).prop_shuffle(),
    ) {
        let with_clauses: Vec<String> = with.iter().map(|w| format!("with {w}")).collect();
        let clauses = [
            format!("from {from}"),
            format!("by {by}"),
            with_clauses.join(" "),
            format!("id {id}"),
            format!("for {recipient}"),
        ];
        let shuffled: Vec<&str> = order.iter().map(|&i| clauses[i].as_str()).collect();
        let raw = format!("{}; {DATE}", shuffled.join(" "));

        let relay = Relay::parse(raw.as_bytes());
        prop_assert!(relay.is_parsed());
        prop_assert_eq!(relay.with(), with.as_slice());

        let expected = format!(
            "from {from} by {by} {} id {id} for {recipient}; ",
            with_clauses.join(" ")
        );
        prop_assert!(relay.canonical().starts_with(&expected));
        prop_assert_eq!(Relay::parse(relay.canonical().as_bytes()), relay);
    }

    #[test]
    fn relay_without_semicolon_is_unparsed(value in "[a-z ]{0,40}") {
        let relay = Relay::parse(value.as_bytes());
        prop_assert!(!relay.is_parsed());
        prop_assert_eq!(relay.from(), "");
        prop_assert!(relay.with().is_empty());
    }

    #[test]
    fn ascii_conversion_is_identity(text in "[ -~\r\n\t]{0,300}") {
        let pairs = [
            (Charset::us_ascii(), Charset::utf_8()),
            (Charset::utf_8(), Charset::iso_8859_1()),
            (Charset::iso_8859_1(), Charset::new("windows-1252")),
        ];
        for (source, dest) in &pairs {
            let converted = charset::convert(text.as_bytes(), source, dest).unwrap();
            prop_assert_eq!(converted.as_slice(), text.as_bytes());
        }
    }
}

#[test]
fn lookup_is_case_insensitive() {
    let message = Message::parse(b"From: a@example.com\r\nsubject: hi\r\n\r\n");
    for name in ["From", "from", "FROM"] {
        assert!(message.header().find(name).is_ok());
    }
    assert!(message.header().find("SUBJECT").is_ok());
    assert!(matches!(message.header().find("To"), Err(Error::NoSuchField(_))));
}

#[test]
fn clone_is_structurally_equal_and_independent() {
    let raw = build_message("clone me", &["one".to_string(), "two".to_string()]);
    let original = Message::parse(raw.as_bytes());
    let mut copy = original.clone();
    assert_eq!(copy, original);
    assert_eq!(copy.parent(PartId::ROOT).unwrap(), None);

    let second = copy.children(PartId::ROOT).unwrap()[1];
    copy.remove_part(second).unwrap();
    assert_eq!(original.children(PartId::ROOT).unwrap().len(), 2);
    assert_ne!(copy, original);
}

#[test]
fn unparsable_fields_survive_generation() {
    let raw = b"Content-Type: ???\r\nReceived: nothing to see here\r\nDate: someday\r\n\r\nbody";
    let message = Message::parse(raw);
    let out = String::from_utf8(message.generate(line_length::INFINITE)).unwrap();
    assert!(out.contains("Content-Type: ???\r\n"));
    assert!(out.contains("Received: nothing to see here\r\n"));
    assert!(out.contains("Date: someday\r\n"));
    assert!(out.ends_with("\r\n\r\nbody"));
}

#[test]
fn custom_registry_changes_field_kind() {
    let config = Config::builder()
        .field("X-Forwarded-To", FieldKind::MailboxList)
        .build();
    let message = Message::parse_with(&config, b"X-Forwarded-To: a@b.example, c@d.example\r\n\r\n");
    let field = message.header().find("x-forwarded-to").unwrap();
    assert_eq!(field.as_mailbox_list().unwrap().len(), 2);
}

#[test]
fn nested_tree_round_trip() {
    let raw = "Content-Type: multipart/mixed; boundary=outer\r\n\r\n\
        --outer\r\n\
        Content-Type: multipart/alternative; boundary=inner\r\n\r\n\
        --inner\r\n\
        Content-Type: text/plain\r\n\r\n\
        plain\r\n\
        --inner\r\n\
        Content-Type: text/html\r\n\r\n\
        <p>html</p>\r\n\
        --inner--\r\n\
        \r\n\
        --outer\r\n\
        Content-Type: application/octet-stream\r\n\
        Content-Transfer-Encoding: base64\r\n\r\n\
        AAECAw==\r\n\
        --outer--\r\n";
    let (part, _) = BodyPart::parse(&Config::default(), raw.as_bytes(), 0, raw.len());
    assert_eq!(part.len(), 5);

    let order = part.depth_first();
    let attachment = part.part(order[4]).unwrap();
    assert_eq!(attachment.decoded_contents().unwrap(), [0, 1, 2, 3]);

    let out = part.generate(line_length::RECOMMENDED);
    let (again, _) = BodyPart::parse(&Config::default(), &out, 0, out.len());
    assert_eq!(again, part);
}
