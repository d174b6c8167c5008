//! The POP3 store: one connection, one request in flight.

use mailsmith_mime::{Header, Message};
use mailsmith_net::{
    DefaultTimeoutHandler, Socket, TcpSocket, TimeoutHandler, read_response, unstuff,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::response::{
    ListEntry, Stat, Status, UidlEntry, apop_digest, apop_timestamp, is_block_complete,
    is_status_complete, parse_listing, split_block,
};

/// A POP3 mailbox.
///
/// A `-ERR` answer or a broken exchange drops the connection before the
/// error is returned.
pub struct Pop3Store<S: Socket = TcpSocket> {
    config: Config,
    mime: mailsmith_mime::Config,
    socket: S,
    timeout: Option<Box<dyn TimeoutHandler>>,
}

impl Pop3Store<TcpSocket> {
    /// Creates a store over TCP, using TLS if the config asks for it.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let socket = TcpSocket::new(config.security);
        Self::new(config, socket)
    }
}

impl<S: Socket> Pop3Store<S> {
    /// Creates a store over `socket`.
    #[must_use]
    pub fn new(config: Config, socket: S) -> Self {
        let timeout = config.timeout.map(|duration| {
            Box::new(DefaultTimeoutHandler::new(duration)) as Box<dyn TimeoutHandler>
        });
        Self {
            config,
            mime: mailsmith_mime::Config::default(),
            socket,
            timeout,
        }
    }

    /// Sets the configuration used to parse retrieved messages.
    #[must_use]
    pub fn with_mime_config(mut self, mime: mailsmith_mime::Config) -> Self {
        self.mime = mime;
        self
    }

    /// Replaces the timeout handler; `None` waits forever.
    pub fn set_timeout_handler(&mut self, handler: Option<Box<dyn TimeoutHandler>>) {
        self.timeout = handler;
    }

    /// Returns the underlying socket.
    #[must_use]
    pub const fn socket(&self) -> &S {
        &self.socket
    }

    /// Returns true while connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    /// Connects, reads the greeting and logs in.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`], socket errors,
    /// [`Error::ConnectionGreeting`] or [`Error::Authentication`].
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        tracing::debug!(host = %self.config.host, port = self.config.port, "connecting");
        self.socket
            .connect(&self.config.host, self.config.port)
            .await?;

        let result = self.login().await;
        self.abort_on_error(result).await
    }

    async fn login(&mut self) -> Result<()> {
        let greeting = self.read_status().await?;
        if !greeting.ok {
            return Err(Error::ConnectionGreeting(greeting.to_line()));
        }

        let username = self.config.username.clone();
        if self.config.use_apop {
            if let Some(timestamp) = apop_timestamp(&greeting.text) {
                let digest = apop_digest(timestamp, &self.config.password);
                let status = self.request(&format!("APOP {username} {digest}"), true).await?;
                if !status.ok {
                    return Err(Error::Authentication(status.to_line()));
                }
                tracing::debug!(%username, "logged in with APOP");
                return Ok(());
            }
            tracing::debug!("greeting has no APOP timestamp, using USER/PASS");
        }

        let status = self.request(&format!("USER {username}"), false).await?;
        if !status.ok {
            return Err(Error::Authentication(status.to_line()));
        }
        let password = format!("PASS {}", self.config.password);
        let status = self.request(&password, true).await?;
        if !status.ok {
            return Err(Error::Authentication(status.to_line()));
        }
        tracing::debug!(%username, "logged in");
        Ok(())
    }

    /// Sends `QUIT` and closes the connection.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`].
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.close().await;
        Ok(())
    }

    /// `STAT`: message count and total size.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], socket errors, [`Error::Command`] or
    /// [`Error::Protocol`].
    pub async fn stat(&mut self) -> Result<Stat> {
        let result = self.stat_inner().await;
        self.abort_on_error(result).await
    }

    async fn stat_inner(&mut self) -> Result<Stat> {
        let status = self.command("STAT").await?;
        Stat::parse(&status.text)
            .ok_or_else(|| Error::Protocol(format!("bad STAT answer: {}", status.to_line())))
    }

    /// `LIST`: the size of every message, or of one.
    ///
    /// # Errors
    ///
    /// As for [`Self::stat`].
    pub async fn list(&mut self, number: Option<u32>) -> Result<Vec<ListEntry>> {
        let result = self.listing("LIST", number, ListEntry::parse).await;
        self.abort_on_error(result).await
    }

    /// `UIDL`: the unique id of every message, or of one.
    ///
    /// # Errors
    ///
    /// As for [`Self::stat`].
    pub async fn uidl(&mut self, number: Option<u32>) -> Result<Vec<UidlEntry>> {
        let result = self.listing("UIDL", number, UidlEntry::parse).await;
        self.abort_on_error(result).await
    }

    async fn listing<T>(
        &mut self,
        verb: &str,
        number: Option<u32>,
        parse: fn(&str) -> Option<T>,
    ) -> Result<Vec<T>> {
        match number {
            Some(number) => {
                let status = self.command(&format!("{verb} {number}")).await?;
                let entry = parse(&status.text).ok_or_else(|| {
                    Error::Protocol(format!("bad {verb} answer: {}", status.to_line()))
                })?;
                Ok(vec![entry])
            }
            None => {
                let block = self.block_command(verb).await?;
                Ok(parse_listing(&block, parse))
            }
        }
    }

    /// `RETR`: the whole message, unstuffed and parsed.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], socket errors or [`Error::Command`].
    pub async fn retrieve(&mut self, number: u32) -> Result<Message> {
        let raw = self.retrieve_raw(number).await?;
        Ok(Message::parse_with(&self.mime, &raw))
    }

    /// `RETR`: the message bytes as stored on the server.
    ///
    /// # Errors
    ///
    /// As for [`Self::retrieve`].
    pub async fn retrieve_raw(&mut self, number: u32) -> Result<Vec<u8>> {
        let result = self.block_command(&format!("RETR {number}")).await;
        self.abort_on_error(result).await
    }

    /// `TOP n 0`: the message header only.
    ///
    /// # Errors
    ///
    /// As for [`Self::retrieve`].
    pub async fn header(&mut self, number: u32) -> Result<Header> {
        let result = self.block_command(&format!("TOP {number} 0")).await;
        let raw = self.abort_on_error(result).await?;
        let (header, _) = Header::parse(&self.mime, &raw, 0, raw.len());
        Ok(header)
    }

    /// `DELE`: marks a message for deletion at `QUIT`.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], socket errors or [`Error::Command`].
    pub async fn delete(&mut self, number: u32) -> Result<()> {
        let result = self.command(&format!("DELE {number}")).await.map(|_status| ());
        self.abort_on_error(result).await
    }

    /// `RSET`: unmarks every deleted message.
    ///
    /// # Errors
    ///
    /// As for [`Self::delete`].
    pub async fn reset(&mut self) -> Result<()> {
        let result = self.command("RSET").await.map(|_status| ());
        self.abort_on_error(result).await
    }

    /// `NOOP`.
    ///
    /// # Errors
    ///
    /// As for [`Self::delete`].
    pub async fn noop(&mut self) -> Result<()> {
        let result = self.command("NOOP").await.map(|_status| ());
        self.abort_on_error(result).await
    }

    /// Sends a single-line command and requires `+OK`.
    async fn command(&mut self, line: &str) -> Result<Status> {
        self.ensure_connected()?;
        let status = self.request(line, false).await?;
        if !status.ok {
            return Err(Error::command(verb(line), status.to_line()));
        }
        Ok(status)
    }

    /// Sends a command answered by a dot-terminated block and returns the
    /// unstuffed block.
    async fn block_command(&mut self, line: &str) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        self.send_line(line, false).await?;
        let buffer = self.read(is_block_complete).await?;
        let (status, block) = split_block(&buffer);
        if !status.ok {
            return Err(Error::command(verb(line), status.to_line()));
        }
        tracing::trace!(bytes = block.len(), "S: +OK with block");
        Ok(unstuff(block))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn request(&mut self, line: &str, sensitive: bool) -> Result<Status> {
        self.send_line(line, sensitive).await?;
        self.read_status().await
    }

    async fn send_line(&mut self, line: &str, sensitive: bool) -> Result<()> {
        if sensitive {
            tracing::trace!(verb = verb(line), "C: <credentials>");
        } else {
            tracing::trace!("C: {line}");
        }
        self.socket.send(line).await?;
        self.socket.send("\r\n").await?;
        Ok(())
    }

    async fn read_status(&mut self) -> Result<Status> {
        let buffer = self.read(is_status_complete).await?;
        let status = Status::parse(&buffer);
        tracing::trace!("S: {}", status.to_line());
        Ok(status)
    }

    async fn read(&mut self, is_complete: fn(&[u8]) -> bool) -> Result<Vec<u8>> {
        let timeout = self
            .timeout
            .as_mut()
            .map(|handler| &mut **handler as &mut dyn TimeoutHandler);
        Ok(read_response(&mut self.socket, timeout, is_complete).await?)
    }

    /// Passes `result` through, dropping the connection first if it failed.
    async fn abort_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if self.is_connected() {
                tracing::warn!(error = %err, "forcing disconnect");
                self.close().await;
            }
        }
        result
    }

    async fn close(&mut self) {
        if let Err(err) = self.socket.send("QUIT\r\n").await {
            tracing::debug!(error = %err, "QUIT not delivered");
        }
        if let Err(err) = self.socket.disconnect().await {
            tracing::debug!(error = %err, "socket close failed");
        }
    }
}

impl<S: Socket + std::fmt::Debug> std::fmt::Debug for Pop3Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Store")
            .field("config", &self.config)
            .field("socket", &self.socket)
            .finish_non_exhaustive()
    }
}

fn verb(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or(line)
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
    use mailsmith_net::mock::ScriptedSocket;

    fn store(script: &[&str]) -> Pop3Store<ScriptedSocket> {
        let config = Config::builder("pop.example.com", "mrose", "tanstaaf")
            .timeout(None)
            .build();
        Pop3Store::new(config, ScriptedSocket::new(script.iter().copied()))
    }

    #[test]
    fn test_verb() {
        assert_eq!(verb("RETR 1"), "RETR");
        assert_eq!(verb("STAT"), "STAT");
        assert_eq!(verb(""), "");
    }

    #[tokio::test]
    async fn test_user_pass_login() {
        let mut pop = store(&["+OK ready\r\n", "+OK user\r\n", "+OK maildrop locked\r\n"]);
        let sent = pop.socket().sent();
        pop.connect().await.unwrap();
        assert_eq!(sent.text(), "USER mrose\r\nPASS tanstaaf\r\n");
        assert_eq!(pop.socket().last_host(), Some(("pop.example.com", 110)));
    }

    #[tokio::test]
    async fn test_apop_login() {
        let config = Config::builder("pop.example.com", "mrose", "tanstaaf")
            .use_apop(true)
            .timeout(None)
            .build();
        let socket = ScriptedSocket::new([
            "+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n",
            "+OK maildrop has 1 message (369 octets)\r\n",
        ]);
        let sent = socket.sent();
        let mut pop = Pop3Store::new(config, socket);
        pop.connect().await.unwrap();
        assert_eq!(
            sent.text(),
            "APOP mrose c4c9334bac560ecc979e58001b3e22fb\r\n"
        );
    }

    #[tokio::test]
    async fn test_apop_without_timestamp_falls_back() {
        let config = Config::builder("pop.example.com", "mrose", "tanstaaf")
            .use_apop(true)
            .timeout(None)
            .build();
        let socket = ScriptedSocket::new(["+OK ready\r\n", "+OK\r\n", "+OK\r\n"]);
        let sent = socket.sent();
        let mut pop = Pop3Store::new(config, socket);
        pop.connect().await.unwrap();
        assert!(sent.text().starts_with("USER mrose\r\n"));
    }

    #[tokio::test]
    async fn test_bad_greeting() {
        let mut pop = store(&["-ERR busy\r\n"]);
        let err = pop.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionGreeting(ref r) if r == "-ERR busy"));
        assert!(!pop.is_connected());
    }

    #[tokio::test]
    async fn test_bad_password() {
        let mut pop = store(&["+OK ready\r\n", "+OK\r\n", "-ERR invalid password\r\n"]);
        let err = pop.connect().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(ref r) if r == "-ERR invalid password"));
        assert!(!pop.is_connected());
    }

    #[tokio::test]
    async fn test_stat_and_listings() {
        let mut pop = store(&[
            "+OK ready\r\n",
            "+OK\r\n",
            "+OK\r\n",
            "+OK 2 320\r\n",
            "+OK 2 messages\r\n1 120\r\n",
            "2 200\r\n.\r\n",
            "+OK 2 200\r\n",
            "+OK\r\n1 whqtswO00WBw418f9t5JxYwZ\r\n2 QhdPYR:00WBw1Ph7x7\r\n.\r\n",
        ]);
        let sent = pop.socket().sent();
        pop.connect().await.unwrap();

        assert_eq!(pop.stat().await.unwrap(), Stat { count: 2, size: 320 });
        let list = pop.list(None).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1], ListEntry { number: 2, size: 200 });
        assert_eq!(
            pop.list(Some(2)).await.unwrap(),
            vec![ListEntry { number: 2, size: 200 }]
        );
        let uids = pop.uidl(None).await.unwrap();
        assert_eq!(uids[1].uid, "QhdPYR:00WBw1Ph7x7");
        assert!(sent.text().ends_with("STAT\r\nLIST\r\nLIST 2\r\nUIDL\r\n"));
    }

    #[tokio::test]
    async fn test_err_forces_disconnect() {
        let mut pop = store(&["+OK\r\n", "+OK\r\n", "+OK\r\n", "-ERR no such message\r\n"]);
        let sent = pop.socket().sent();
        pop.connect().await.unwrap();

        let err = pop.delete(9).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Command { ref command, ref response }
                if command == "DELE" && response == "-ERR no such message"
        ));
        assert!(!pop.is_connected());
        assert!(sent.text().ends_with("DELE 9\r\nQUIT\r\n"));
        assert!(matches!(pop.noop().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut pop = store(&[]);
        assert!(matches!(pop.stat().await, Err(Error::NotConnected)));
        assert!(matches!(pop.disconnect().await, Err(Error::NotConnected)));
    }
}
