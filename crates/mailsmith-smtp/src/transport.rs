//! The SMTP transport: one connection, one request in flight.

use mailsmith_mime::{Mailbox, MailboxList, Message, line_length};
use mailsmith_net::{
    DefaultTimeoutHandler, DotStuffer, Socket, TcpSocket, TimeoutHandler, read_response,
};

use crate::auth::cram_md5_response;
use crate::command::Command;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extension::{AuthMechanism, Extension, ServerInfo};
use crate::reply::{Reply, ReplyCode, is_reply_complete};

/// Bytes of message data stuffed and written per socket call.
const DATA_CHUNK: usize = 8192;

/// Sends messages through an SMTP server.
///
/// Any failure after the greeting aborts the operation and drops the
/// connection, so the transport is never left mid-dialogue.
pub struct SmtpTransport<S: Socket = TcpSocket> {
    config: Config,
    mime: mailsmith_mime::Config,
    socket: S,
    timeout: Option<Box<dyn TimeoutHandler>>,
    server_info: ServerInfo,
}

impl SmtpTransport<TcpSocket> {
    /// Creates a transport over TCP, using TLS if the config asks for it.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let socket = TcpSocket::new(config.security);
        Self::new(config, socket)
    }
}

impl<S: Socket> SmtpTransport<S> {
    /// Creates a transport over `socket`.
    #[must_use]
    pub fn new(config: Config, socket: S) -> Self {
        let timeout = config.timeout.map(|duration| {
            Box::new(DefaultTimeoutHandler::new(duration)) as Box<dyn TimeoutHandler>
        });
        Self {
            config,
            mime: mailsmith_mime::Config::builder()
                .max_line_length(line_length::RECOMMENDED)
                .build(),
            socket,
            timeout,
            server_info: ServerInfo::default(),
        }
    }

    /// Sets the configuration used to generate messages passed to
    /// [`Self::send_message`]. The default folds at 78 columns.
    #[must_use]
    pub fn with_mime_config(mut self, mime: mailsmith_mime::Config) -> Self {
        self.mime = mime;
        self
    }

    /// Replaces the timeout handler; `None` waits forever.
    pub fn set_timeout_handler(&mut self, handler: Option<Box<dyn TimeoutHandler>>) {
        self.timeout = handler;
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns what the server advertised during the last connect.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
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

    /// Connects, reads the greeting, says EHLO (or HELO) and authenticates
    /// if configured to.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyConnected`], socket errors,
    /// [`Error::ConnectionGreeting`] if the greeting or HELO is refused, and
    /// [`Error::Authentication`] or [`Error::Command`] from `AUTH`.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        tracing::debug!(host = %self.config.host, port = self.config.port, "connecting");
        self.socket
            .connect(&self.config.host, self.config.port)
            .await?;
        self.server_info = ServerInfo::default();

        let result = self.handshake().await;
        self.abort_on_error(result).await
    }

    async fn handshake(&mut self) -> Result<()> {
        let greeting = self.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::ConnectionGreeting(greeting.to_line()));
        }
        self.server_info.hostname = greeting
            .message
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or_default()
            .to_string();

        self.hello().await?;

        if self.config.need_authentication {
            if !self.server_info.extended {
                return Err(Error::command("AUTH", "ESMTP not supported."));
            }
            self.authenticate().await?;
        }
        Ok(())
    }

    async fn hello(&mut self) -> Result<()> {
        let hostname = self.config.client_hostname.clone();
        let reply = self
            .request(&Command::Ehlo {
                hostname: hostname.clone(),
            })
            .await?;

        if reply.code == ReplyCode::OK {
            self.server_info.extended = true;
            self.server_info.extensions = reply
                .message
                .iter()
                .skip(1)
                .map(|line| Extension::parse(line))
                .collect();
            return Ok(());
        }

        tracing::debug!(reply = %reply.to_line(), "EHLO refused, falling back to HELO");
        let reply = self.request(&Command::Helo { hostname }).await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::ConnectionGreeting(reply.to_line()));
        }
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<()> {
        let credentials = self
            .config
            .credentials
            .clone()
            .ok_or_else(|| Error::Authentication("no credentials configured".into()))?;

        let reply = self
            .request(&Command::Auth {
                mechanism: AuthMechanism::CramMd5,
            })
            .await?;
        if reply.code != ReplyCode::AUTH_CONTINUE {
            return Err(Error::Authentication(reply.to_line()));
        }

        let challenge = reply.message.first().map_or("", String::as_str);
        let answer = cram_md5_response(challenge, &credentials.username, &credentials.password)?;

        let reply = self.request(&Command::AuthResponse(answer)).await?;
        if reply.code != ReplyCode::AUTH_SUCCESS {
            return Err(Error::Authentication(reply.to_line()));
        }
        tracing::debug!(username = %credentials.username, "authenticated");
        Ok(())
    }

    /// Sends `QUIT` and closes the connection.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] or socket errors.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.close().await;
        Ok(())
    }

    /// Sends `NOOP`; the server must answer 250.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], socket errors or [`Error::Command`].
    pub async fn noop(&mut self) -> Result<()> {
        self.simple_command(Command::Noop).await
    }

    /// Sends `RSET` to abandon a transaction.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`], socket errors or [`Error::Command`].
    pub async fn reset(&mut self) -> Result<()> {
        self.simple_command(Command::Rset).await
    }

    async fn simple_command(&mut self, command: Command) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let result = self.expect(&command, ReplyCode::OK).await.map(|_reply| ());
        self.abort_on_error(result).await
    }

    /// Sends `message`: the expeditor comes from `From` (or `Sender`) and
    /// the recipients from `To`, `Cc` and `Bcc`.
    ///
    /// # Errors
    ///
    /// [`Error::NoExpeditor`], then everything [`Self::send`] returns.
    pub async fn send_message(&mut self, message: &Message) -> Result<()> {
        let expeditor = message.expeditor().cloned().ok_or(Error::NoExpeditor)?;
        let recipients = message.recipients();
        let data = message.generate_with(&self.mime);
        self.send(&expeditor, &recipients, &data).await
    }

    /// Runs one mail transaction: `MAIL FROM`, one `RCPT TO` per
    /// recipient, `DATA`, the dot-stuffed body and the end-of-data marker.
    ///
    /// # Errors
    ///
    /// [`Error::NoRecipient`], [`Error::NoExpeditor`],
    /// [`Error::NotConnected`], socket errors, or [`Error::Command`] naming
    /// the refused step.
    pub async fn send(
        &mut self,
        expeditor: &Mailbox,
        recipients: &MailboxList,
        data: &[u8],
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::NoRecipient);
        }
        if expeditor.is_empty() {
            return Err(Error::NoExpeditor);
        }
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let result = self.transaction(expeditor, recipients, data).await;
        self.abort_on_error(result).await
    }

    async fn transaction(
        &mut self,
        expeditor: &Mailbox,
        recipients: &MailboxList,
        data: &[u8],
    ) -> Result<()> {
        self.expect(
            &Command::MailFrom {
                from: expeditor.email().to_string(),
            },
            ReplyCode::OK,
        )
        .await?;

        for recipient in recipients {
            self.expect(
                &Command::RcptTo {
                    to: recipient.email().to_string(),
                },
                ReplyCode::OK,
            )
            .await?;
        }

        self.expect(&Command::Data, ReplyCode::START_DATA).await?;

        let mut stuffer = DotStuffer::new();
        let mut wire = Vec::with_capacity(DATA_CHUNK + DATA_CHUNK / 64);
        for chunk in data.chunks(DATA_CHUNK) {
            wire.clear();
            stuffer.stuff(chunk, &mut wire);
            self.socket.send_raw(&wire).await?;
        }
        self.socket.send_raw(stuffer.terminator()).await?;
        tracing::debug!(bytes = data.len(), recipients = recipients.len(), "data sent");

        let reply = self.read_reply().await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::command(Command::Data.verb(), reply.to_line()));
        }
        Ok(())
    }

    /// Sends `command` and fails unless the reply carries `code`.
    async fn expect(&mut self, command: &Command, code: ReplyCode) -> Result<Reply> {
        let reply = self.request(command).await?;
        if reply.code != code {
            return Err(Error::command(command.verb(), reply.to_line()));
        }
        Ok(reply)
    }

    async fn request(&mut self, command: &Command) -> Result<Reply> {
        let line = command.serialize();
        if command.is_sensitive() {
            tracing::trace!(verb = command.verb(), "C: <credentials>");
        } else {
            tracing::trace!("C: {}", String::from_utf8_lossy(&line).trim_end());
        }
        self.socket.send_raw(&line).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let timeout = self
            .timeout
            .as_mut()
            .map(|handler| &mut **handler as &mut dyn TimeoutHandler);
        let buffer = read_response(&mut self.socket, timeout, is_reply_complete).await?;
        let reply = Reply::parse(&buffer)?;
        tracing::trace!(code = %reply.code, "S: {}", reply.message.join(" | "));
        Ok(reply)
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
        if let Err(err) = self.socket.send_raw(&Command::Quit.serialize()).await {
            tracing::debug!(error = %err, "QUIT not delivered");
        }
        if let Err(err) = self.socket.disconnect().await {
            tracing::debug!(error = %err, "socket close failed");
        }
        self.server_info = ServerInfo::default();
    }
}

impl<S: Socket + std::fmt::Debug> std::fmt::Debug for SmtpTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("config", &self.config)
            .field("socket", &self.socket)
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
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
    use mailsmith_net::mock::ScriptedSocket;

    fn transport(script: &[&str]) -> SmtpTransport<ScriptedSocket> {
        let config = Config::builder("mx.example.com")
            .client_hostname("client.test")
            .timeout(None)
            .build();
        SmtpTransport::new(config, ScriptedSocket::new(script.iter().copied()))
    }

    #[tokio::test]
    async fn test_connect_with_ehlo() {
        let mut smtp = transport(&[
            "220 mx.example.com ESMTP\r\n",
            "250-mx.example.com\r\n250-SIZE 1000\r\n250 PIPELINING\r\n",
        ]);
        let sent = smtp.socket().sent();
        smtp.connect().await.unwrap();

        assert!(smtp.is_connected());
        assert_eq!(sent.text(), "EHLO client.test\r\n");
        assert_eq!(smtp.server_info().hostname, "mx.example.com");
        assert!(smtp.server_info().extended);
        assert_eq!(smtp.server_info().max_message_size(), Some(1000));
        assert!(smtp.server_info().supports(&Extension::Pipelining));
        assert_eq!(smtp.socket().last_host(), Some(("mx.example.com", 25)));
    }

    #[tokio::test]
    async fn test_helo_fallback() {
        let mut smtp = transport(&[
            "220 old.example.com\r\n",
            "502 command not implemented\r\n",
            "250 old.example.com\r\n",
        ]);
        let sent = smtp.socket().sent();
        smtp.connect().await.unwrap();

        assert_eq!(sent.text(), "EHLO client.test\r\nHELO client.test\r\n");
        assert!(!smtp.server_info().extended);
    }

    #[tokio::test]
    async fn test_bad_greeting_disconnects() {
        let mut smtp = transport(&["554 go away\r\n"]);
        let result = smtp.connect().await;
        assert!(matches!(result, Err(Error::ConnectionGreeting(ref r)) if r == "554 go away"));
        assert!(!smtp.is_connected());
    }

    #[tokio::test]
    async fn test_already_connected() {
        let mut smtp = transport(&["220 hi\r\n", "250 hi\r\n"]);
        smtp.connect().await.unwrap();
        assert!(matches!(smtp.connect().await, Err(Error::AlreadyConnected)));
    }

    #[tokio::test]
    async fn test_auth_requires_esmtp() {
        let config = Config::builder("mx.example.com")
            .credentials("tim", "pw")
            .timeout(None)
            .build();
        let socket = ScriptedSocket::new(["220 hi\r\n", "500 what\r\n", "250 hi\r\n"]);
        let mut smtp = SmtpTransport::new(config, socket);

        let err = smtp.connect().await.unwrap_err();
        assert!(
            matches!(err, Error::Command { ref command, ref response }
                if command == "AUTH" && response == "ESMTP not supported.")
        );
        assert!(!smtp.is_connected());
    }

    #[tokio::test]
    async fn test_cram_md5_exchange() {
        let config = Config::builder("mx.example.com")
            .client_hostname("client.test")
            .credentials("tim", "tanstaaftanstaaf")
            .timeout(None)
            .build();
        let socket = ScriptedSocket::new([
            "220 hi\r\n",
            "250-hi\r\n250 AUTH CRAM-MD5\r\n",
            "334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n",
            "235 ok\r\n",
        ]);
        let sent = socket.sent();
        let mut smtp = SmtpTransport::new(config, socket);
        smtp.connect().await.unwrap();

        assert_eq!(
            sent.text(),
            "EHLO client.test\r\nAUTH CRAM-MD5\r\n\
             dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw\r\n"
        );
        assert_eq!(
            smtp.server_info().auth_mechanisms(),
            vec![AuthMechanism::CramMd5]
        );
    }

    #[tokio::test]
    async fn test_auth_rejected() {
        let config = Config::builder("mx.example.com")
            .credentials("tim", "wrong")
            .timeout(None)
            .build();
        let socket = ScriptedSocket::new([
            "220 hi\r\n",
            "250 hi\r\n",
            "334 PDE4OTY+\r\n",
            "535 bad credentials\r\n",
        ]);
        let mut smtp = SmtpTransport::new(config, socket);

        let err = smtp.connect().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(ref r) if r == "535 bad credentials"));
        assert!(!smtp.is_connected());
    }

    #[tokio::test]
    async fn test_noop_and_reset() {
        let mut smtp = transport(&["220 hi\r\n", "250 hi\r\n", "250 ok\r\n", "250 flushed\r\n"]);
        let sent = smtp.socket().sent();
        smtp.connect().await.unwrap();
        smtp.noop().await.unwrap();
        smtp.reset().await.unwrap();
        assert!(sent.text().ends_with("NOOP\r\nRSET\r\n"));
    }

    #[tokio::test]
    async fn test_noop_refused_disconnects() {
        let mut smtp = transport(&["220 hi\r\n", "250 hi\r\n", "421 closing\r\n"]);
        smtp.connect().await.unwrap();
        let err = smtp.noop().await.unwrap_err();
        assert!(matches!(err, Error::Command { ref command, .. } if command == "NOOP"));
        assert!(!smtp.is_connected());
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut smtp = transport(&[]);
        assert!(matches!(smtp.noop().await, Err(Error::NotConnected)));
        assert!(matches!(smtp.disconnect().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_disconnect_sends_quit() {
        let mut smtp = transport(&["220 hi\r\n", "250 hi\r\n"]);
        let sent = smtp.socket().sent();
        smtp.connect().await.unwrap();
        smtp.disconnect().await.unwrap();
        assert!(sent.text().ends_with("QUIT\r\n"));
        assert!(!smtp.is_connected());
    }
}
