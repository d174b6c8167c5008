//! # mailsmith-mime
//!
//! MIME message parsing and generation.
//!
//! ## Features
//!
//! - **Lenient parsing**: malformed header lines are skipped, malformed
//!   values are kept raw and written back unchanged
//! - **Part trees**: multipart bodies become an arena of parts addressed by
//!   [`PartId`], with prolog and epilog preserved
//! - **Header text**: RFC 2047 encoded words, folding and per-word charsets
//! - **Typed fields**: mailbox lists, content types, transfer encodings,
//!   `Received:` traces and dates, selected through a [`FieldRegistry`]
//! - **Charsets**: streaming, chunked conversion on top of `encoding_rs`
//!
//! ## Quick Start
//!
//! ### Parsing
//!
//! ```ignore
//! use mailsmith_mime::Message;
//!
//! let message = Message::parse(raw_bytes);
//! if let Some(subject) = message.subject() {
//!     println!("Subject: {}", subject);
//! }
//! for id in message.depth_first() {
//!     let part = message.part(id)?;
//!     println!("{:?}: {} bytes", part.content_type(), part.body().contents().len());
//! }
//! ```
//!
//! ### Building
//!
//! ```ignore
//! use mailsmith_mime::{BodyPart, Config, Message, PartId, Session, TransferEncoding, line_length};
//!
//! let mut session = Session::new(Config::from_locale());
//! let mut message = Message::new();
//! message.set_subject("Quarterly report");
//! message.make_multipart(PartId::ROOT, "mixed", &mut session)?;
//!
//! let mut text = BodyPart::new();
//! text.set_contents(PartId::ROOT, "Numbers attached.".as_bytes(), TransferEncoding::QuotedPrintable)?;
//! message.add_part(PartId::ROOT, text)?;
//!
//! let bytes = message.generate(line_length::RECOMMENDED);
//! ```
//!
//! ### Charsets
//!
//! ```ignore
//! use mailsmith_mime::{Charset, charset};
//!
//! let latin1 = charset::convert("café".as_bytes(), &Charset::utf_8(), &Charset::iso_8859_1())?;
//! assert_eq!(latin1, b"caf\xE9");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod body;
mod content_type;
mod datetime;
mod error;
mod field;
mod header;
mod mailbox;
mod message;
mod part;
mod relay;
mod session;
mod word;

pub mod charset;
pub mod encoding;
pub mod text;

pub use body::Body;
pub use charset::{Charset, Converter, TranscodeSession, TranscoderEngine};
pub use content_type::ContentType;
pub use datetime::DateTime;
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use field::{FieldKind, FieldRegistry, FieldValue, HeaderField};
pub use header::Header;
pub use mailbox::{Mailbox, MailboxList};
pub use message::Message;
pub use part::{BodyPart, PartId, PartRef};
pub use relay::Relay;
pub use session::{Config, ConfigBuilder, Session};
pub use text::{FoldFlags, Text, line_length};
pub use word::Word;
