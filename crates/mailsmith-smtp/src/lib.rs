//! # mailsmith-smtp
//!
//! An SMTP transport for [`mailsmith_mime::Message`]s.
//!
//! - Greeting, EHLO with HELO fallback, optional `AUTH CRAM-MD5`
//! - Mail transactions with dot-stuffed `DATA`
//! - Any failed step drops the connection
//!
//! ```ignore
//! use mailsmith_smtp::{Config, SmtpTransport};
//!
//! let config = Config::builder("smtp.example.com")
//!     .credentials("user", "secret")
//!     .build();
//! let mut smtp = SmtpTransport::from_config(config);
//! smtp.connect().await?;
//! smtp.send_message(&message).await?;
//! smtp.disconnect().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod auth;
mod command;
mod config;
mod error;
mod extension;
mod reply;
mod transport;

pub use auth::cram_md5_response;
pub use command::Command;
pub use config::{Config, ConfigBuilder, Credentials, default_port};
pub use error::{Error, Result};
pub use extension::{AuthMechanism, Extension, ServerInfo};
pub use mailsmith_net::Security;
pub use reply::{Reply, ReplyCode, is_reply_complete};
pub use transport::SmtpTransport;
