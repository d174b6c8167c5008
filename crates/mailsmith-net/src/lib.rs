//! # mailsmith-net
//!
//! The transport layer under the mailsmith protocol clients.
//!
//! - [`Socket`]: connect, send, poll for received bytes, disconnect
//! - [`TcpSocket`]: plain TCP or implicit TLS through rustls
//! - [`TimeoutHandler`]: consulted while a client waits for a response
//! - [`read_response`]: the receive loop, parameterized by a completion test
//! - [`DotStuffer`] and [`unstuff`]: the `.` end-of-data convention
//!
//! With the `mock` feature, `mock::ScriptedSocket` replays canned server
//! output for tests.
//!
//! ```ignore
//! use mailsmith_net::{DefaultTimeoutHandler, Security, Socket, TcpSocket, read_response, ends_with_line};
//! use std::time::Duration;
//!
//! let mut socket = TcpSocket::new(Security::Implicit);
//! socket.connect("pop.example.com", 995).await?;
//! let mut timeout = DefaultTimeoutHandler::new(Duration::from_secs(30));
//! let greeting = read_response(&mut socket, Some(&mut timeout), ends_with_line).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod dot;
mod error;
mod response;
mod socket;
mod tcp;
mod timeout;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use dot::{DotStuffer, ends_with_dot_line, unstuff};
pub use error::{Error, Result};
pub use response::{ends_with_line, last_line, read_response};
pub use socket::{Security, Socket};
pub use tcp::TcpSocket;
pub use timeout::{DefaultTimeoutHandler, TimeoutHandler};
