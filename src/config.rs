use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conversation::DEFAULT_CONTEXT_TURNS;
use crate::llm::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};

/// Environment variable checked for the API token unless configured otherwise.
pub const DEFAULT_TOKEN_ENV: &str = "HF_TOKEN";

/// Main application configuration
///
/// The API token is not stored here; it lives only for the lifetime of a
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completion endpoint URL
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model: String,

    pub max_tokens: u32,

    pub temperature: f64,

    /// Upper bound on a single completion call
    pub timeout_secs: u64,

    /// How many recent turns are sent as context
    pub context_turns: usize,

    /// Name of the environment variable holding the API token
    pub token_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            context_turns: DEFAULT_CONTEXT_TURNS,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl Config {
    /// `~/.agrogpt/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".agrogpt").join("config.toml"))
    }

    /// Load configuration from the default location, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Read the token environment variable, if set and non-blank.
    pub fn env_credential(&self) -> Option<Credential> {
        std::env::var(&self.token_env)
            .ok()
            .and_then(Credential::new)
    }
}

/// Opaque bearer token for the inference endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Blank input is not a credential.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Where a session's credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Entered,
}

/// Environment value wins over an interactively entered one.
pub fn resolve_credential<'a>(
    env: Option<&'a Credential>,
    entered: Option<&'a Credential>,
) -> Option<(&'a Credential, CredentialSource)> {
    env.map(|c| (c, CredentialSource::Environment))
        .or_else(|| entered.map(|c| (c, CredentialSource::Entered)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(Duration::from_secs(config.timeout_secs), DEFAULT_TIMEOUT);
        assert_eq!(config.context_turns, 10);
        assert_eq!(config.token_env, "HF_TOKEN");
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = \"my-model\"\ntimeout_secs = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "my-model");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            temperature: 0.2,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.to_lowercase().contains("token ="));
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn blank_tokens_are_not_credentials() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" hf_abc ").unwrap().expose(), "hf_abc");
    }

    #[test]
    fn debug_output_hides_token() {
        let credential = Credential::new("hf_secret").unwrap();
        assert!(!format!("{credential:?}").contains("hf_secret"));
    }

    #[test]
    fn environment_takes_precedence() {
        let env = Credential::new("from-env");
        let entered = Credential::new("typed");

        let (token, source) = resolve_credential(env.as_ref(), entered.as_ref()).unwrap();
        assert_eq!(token.expose(), "from-env");
        assert_eq!(source, CredentialSource::Environment);

        let (token, source) = resolve_credential(None, entered.as_ref()).unwrap();
        assert_eq!(token.expose(), "typed");
        assert_eq!(source, CredentialSource::Entered);

        assert!(resolve_credential(None, None).is_none());
    }
}
