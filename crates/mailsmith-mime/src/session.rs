//! Parsing configuration and per-session state.
//!
//! Nothing in this crate reads process-wide state on its own. Callers build
//! a [`Config`] once (optionally from the locale) and pass it to parsers; a
//! [`Session`] adds the random source used for boundaries and message ids.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::charset::Charset;
use crate::field::{FieldKind, FieldRegistry};
use crate::text::line_length;

const BOUNDARY_PREFIX: &str = "=_mailsmith_";

/// Parser and generator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Charset assumed for untagged 8-bit header text.
    pub default_charset: Charset,
    /// Field name to value kind mapping.
    pub registry: FieldRegistry,
    /// Folding limit used by generators.
    pub max_line_length: usize,
}

impl Config {
    /// Creates a configuration with US-ASCII as the default charset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_charset: Charset::us_ascii(),
            registry: FieldRegistry::default(),
            max_line_length: line_length::INFINITE,
        }
    }

    /// Creates a configuration whose default charset comes from the locale.
    #[must_use]
    pub fn from_locale() -> Self {
        Self::builder().default_charset(Charset::from_locale()).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    default_charset: Charset,
    registry: FieldRegistry,
    max_line_length: usize,
}

impl ConfigBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_charset: Charset::us_ascii(),
            registry: FieldRegistry::default(),
            max_line_length: line_length::INFINITE,
        }
    }

    /// Sets the default charset.
    #[must_use]
    pub fn default_charset(mut self, charset: Charset) -> Self {
        self.default_charset = charset;
        self
    }

    /// Replaces the field registry.
    #[must_use]
    pub fn registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers an additional field kind.
    #[must_use]
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.registry.register(name, kind);
        self
    }

    /// Sets the folding limit.
    #[must_use]
    pub const fn max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            default_charset: self.default_charset,
            registry: self.registry,
            max_line_length: self.max_line_length,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration plus a random source.
#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
    rng: StdRng,
}

impl Session {
    /// Creates a session seeded from the operating system.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a session with a fixed seed, for reproducible output.
    #[must_use]
    pub fn with_seed(config: Config, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn random_token(&mut self, len: usize) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    /// Generates a multipart boundary.
    pub fn generate_boundary(&mut self) -> String {
        format!("{BOUNDARY_PREFIX}{}", self.random_token(24))
    }

    /// Generates a `Message-ID` value for `host`, including angle brackets.
    pub fn generate_message_id(&mut self, host: &str) -> String {
        let stamp = Utc::now().timestamp();
        let token = self.random_token(16);
        format!("<{stamp}.{token}@{host}>")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
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
    fn test_config_defaults() {
        let config = Config::new();
        assert!(config.default_charset.is_us_ascii());
        assert_eq!(config.max_line_length, line_length::INFINITE);
        assert_eq!(config.registry.kind_for("from"), FieldKind::MailboxList);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .default_charset(Charset::iso_8859_1())
            .max_line_length(line_length::MAX)
            .field("X-Archived-At", FieldKind::Date)
            .build();

        assert_eq!(config.default_charset, Charset::iso_8859_1());
        assert_eq!(config.max_line_length, 998);
        assert_eq!(config.registry.kind_for("x-archived-at"), FieldKind::Date);
    }

    #[test]
    fn test_seeded_sessions_repeat() {
        let mut a = Session::with_seed(Config::new(), 7);
        let mut b = Session::with_seed(Config::new(), 7);
        assert_eq!(a.generate_boundary(), b.generate_boundary());
    }

    #[test]
    fn test_boundaries_differ() {
        let mut session = Session::with_seed(Config::new(), 1);
        let first = session.generate_boundary();
        let second = session.generate_boundary();
        assert_ne!(first, second);
        assert!(first.starts_with(BOUNDARY_PREFIX));
        assert!(first.len() <= 70);
    }

    #[test]
    fn test_message_id_shape() {
        let mut session = Session::with_seed(Config::new(), 3);
        let id = session.generate_message_id("example.com");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
    }
}
