//! POP3 store configuration.

use std::time::Duration;

use mailsmith_net::Security;

/// Port used when none is configured.
#[must_use]
pub const fn default_port(security: Security) -> u16 {
    match security {
        Security::None => 110,
        Security::Implicit => 995,
    }
}

/// POP3 store configuration.
#[derive(Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Mailbox user.
    pub username: String,
    /// Mailbox password.
    pub password: String,
    /// Log in with `APOP` when the greeting carries a timestamp.
    pub use_apop: bool,
    /// How long to wait for a response; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Config {
    /// Creates a plain-text configuration on port 110.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ConfigBuilder::new(host, username, password).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ConfigBuilder {
        ConfigBuilder::new(host, username, password)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_apop", &self.use_apop)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for [`Config`].
#[derive(Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    username: String,
    password: String,
    use_apop: bool,
    timeout: Option<Duration>,
}

impl ConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            username: username.into(),
            password: password.into(),
            use_apop: false,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Prefers `APOP` over `USER`/`PASS`.
    #[must_use]
    pub const fn use_apop(mut self, use_apop: bool) -> Self {
        self.use_apop = use_apop;
        self
    }

    /// Sets the response timeout; `None` waits forever.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| default_port(self.security)),
            security: self.security,
            username: self.username,
            password: self.password,
            use_apop: self.use_apop,
            timeout: self.timeout,
        }
    }
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("host", &self.host)
            .field("security", &self.security)
            .field("username", &self.username)
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Config::new("pop.example.com", "u", "p").port, 110);
        let config = Config::builder("pop.example.com", "u", "p")
            .security(Security::Implicit)
            .build();
        assert_eq!(config.port, 995);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder("pop.example.com", "mrose", "tanstaaf")
            .port(1110)
            .use_apop(true)
            .timeout(None)
            .build();
        assert_eq!(config.port, 1110);
        assert!(config.use_apop);
        assert_eq!(config.timeout, None);
        assert_eq!(config.username, "mrose");
    }

    #[test]
    fn test_password_not_in_debug() {
        let config = Config::new("pop.example.com", "mrose", "tanstaaf");
        assert!(!format!("{config:?}").contains("tanstaaf"));
        let builder = Config::builder("pop.example.com", "mrose", "tanstaaf");
        assert!(!format!("{builder:?}").contains("tanstaaf"));
    }
}
