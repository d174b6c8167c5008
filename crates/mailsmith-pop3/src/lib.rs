//! # mailsmith-pop3
//!
//! A POP3 client that hands retrieved mail back as
//! [`mailsmith_mime::Message`]s.
//!
//! ```ignore
//! use mailsmith_pop3::{Config, Pop3Store};
//!
//! let mut pop = Pop3Store::from_config(Config::new("pop.example.com", "user", "secret"));
//! pop.connect().await?;
//! let stat = pop.stat().await?;
//! for n in 1..=stat.count {
//!     let message = pop.retrieve(n).await?;
//!     println!("{:?}", message.subject());
//! }
//! pop.disconnect().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod response;
mod store;

pub use config::{Config, ConfigBuilder, default_port};
pub use error::{Error, Result};
pub use mailsmith_net::Security;
pub use response::{ListEntry, Stat, Status, UidlEntry, apop_digest, apop_timestamp};
pub use store::Pop3Store;
