use crate::backoff::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS, ReconnectPolicy,
};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_URL: &str = "wss://api.openai.com/v1/realtime";
const DEFAULT_PROTOCOL_VERSION: &str = "realtime=v1";
const DEFAULT_JOURNAL_PATH: &str = "session_history.json";
const DEFAULT_HANDSHAKE_INSTRUCTIONS: &str = "Please assist the user.";

/// Connection parameters for a session, passed explicitly at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Full service URL, including any model query parameters.
    pub url: String,
    /// Static bearer credential sent in the `Authorization` header.
    pub api_key: String,
    /// Value of the protocol-version header.
    pub protocol_version: String,
    /// Destination the journal is persisted to when the session ends.
    pub journal_path: PathBuf,
    /// Instructions carried by the handshake `response.create`.
    pub handshake_instructions: String,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: String::new(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            journal_path: PathBuf::from(DEFAULT_JOURNAL_PATH),
            handshake_instructions: DEFAULT_HANDSHAKE_INSTRUCTIONS.to_string(),
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML file; absent keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|err| Error::Config(err.to_string()))
    }

    /// Backoff schedule derived from the configured limits.
    #[must_use]
    pub const fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_sensible() {
        let config = SessionConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.protocol_version, "realtime=v1");
        assert_eq!(config.journal_path, PathBuf::from("session_history.json"));
        assert_eq!(config.max_attempts, 5);

        let policy = config.reconnect_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(1_000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
    }

    #[test]
    fn toml_file_overrides_named_fields_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
url = "wss://example.test/v1/realtime?model=demo"
api_key = "sk-test"
base_delay_ms = 50
max_attempts = 2
"#
        )
        .unwrap();

        let config = SessionConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.url, "wss://example.test/v1/realtime?model=demo");
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.base_delay_ms, 50);
        assert_eq!(config.max_attempts, 2);
        // Untouched keys fall back to defaults.
        assert_eq!(config.protocol_version, "realtime=v1");
        assert_eq!(config.max_delay_ms, 30_000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_key = \"sk-test\"\nmystery = true").unwrap();
        assert!(matches!(
            SessionConfig::from_toml_file(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            SessionConfig::from_toml_file("/definitely/not/here.toml"),
            Err(Error::Io(_))
        ));
    }
}
