//! SMTP transport configuration.

use std::time::Duration;

use mailsmith_net::Security;

/// Port used when none is configured.
#[must_use]
pub const fn default_port(security: Security) -> u16 {
    match security {
        Security::None => 25,
        Security::Implicit => 465,
    }
}

/// Username and password for `AUTH`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP transport configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Name announced in EHLO/HELO.
    pub client_hostname: String,
    /// Credentials for `AUTH`.
    pub credentials: Option<Credentials>,
    /// Authenticate right after the greeting.
    pub need_authentication: bool,
    /// How long to wait for a reply; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Config {
    /// Creates a plain-text configuration on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    client_hostname: String,
    credentials: Option<Credentials>,
    need_authentication: bool,
    timeout: Option<Duration>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            client_hostname: "localhost".to_string(),
            credentials: None,
            need_authentication: false,
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

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn client_hostname(mut self, name: impl Into<String>) -> Self {
        self.client_hostname = name.into();
        self
    }

    /// Sets credentials and turns authentication on.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self.need_authentication = true;
        self
    }

    /// Turns authentication on or off.
    #[must_use]
    pub const fn need_authentication(mut self, need: bool) -> Self {
        self.need_authentication = need;
        self
    }

    /// Sets the reply timeout; `None` waits forever.
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
            client_hostname: self.client_hostname,
            credentials: self.credentials,
            need_authentication: self.need_authentication,
            timeout: self.timeout,
        }
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
        assert_eq!(default_port(Security::None), 25);
        assert_eq!(default_port(Security::Implicit), 465);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.client_hostname, "localhost");
        assert!(!config.need_authentication);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .client_hostname("client.example.com")
            .credentials("user", "secret")
            .timeout(None)
            .build();

        assert_eq!(config.port, 465);
        assert_eq!(config.client_hostname, "client.example.com");
        assert!(config.need_authentication);
        assert_eq!(config.credentials.as_ref().unwrap().username, "user");
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .port(2525)
            .build();
        assert_eq!(config.port, 2525);
    }

    #[test]
    fn test_password_not_in_debug() {
        let credentials = Credentials::new("user", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
