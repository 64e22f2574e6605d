/*
[INPUT]:  YAML configuration file, CONTRIBLOCK_* environment variables
[OUTPUT]: Parsed and validated CLI configuration
[POS]:    Configuration layer - client setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use url::Url;

use contriblock_auth::auth::DEFAULT_STATEMENT;
use contriblock_auth::{AuthConfig, AuthMode, ClientConfig};

/// Prefix of environment overrides, e.g. `CONTRIBLOCK_API_URL`
pub const ENV_PREFIX: &str = "CONTRIBLOCK";

/// Top-level configuration for the ContriBlock client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Base URL of the ContriBlock API
    pub api_url: String,
    /// Host presented in the sign-in message
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Origin URL presented in the sign-in message
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Sign-in statement; the built-in one is used when absent
    #[serde(default)]
    pub statement: Option<String>,
    /// "siwe" or "demo"
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default)]
    pub require_metamask: bool,
    /// Where the session file lives (default: <data_dir>/contriblock)
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Hex EVM key used to sign in; normally supplied via CONTRIBLOCK_PRIVATE_KEY
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
}

fn default_domain() -> String {
    "localhost:3000".to_string()
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_chain_id() -> u64 {
    1337
}

fn default_timeout_secs() -> u64 {
    30
}

impl CliConfig {
    /// Load the optional YAML file layered under `CONTRIBLOCK_*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like `load`, but reads overrides from `env` instead of the process
    /// environment when given
    pub fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            let path_str = path.to_str().context("config path must be valid utf-8")?;
            builder = builder.add_source(File::new(path_str, FileFormat::Yaml).required(true));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).source(env))
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")
    }

    pub fn validate(&self) -> Result<()> {
        let api_url = Url::parse(&self.api_url)
            .with_context(|| format!("api_url is not a valid URL: {}", self.api_url))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            bail!("api_url must use http or https, got {}", api_url.scheme());
        }

        if self.domain.trim().is_empty() || self.domain.contains(char::is_whitespace) {
            bail!("domain must be a non-empty host without whitespace");
        }
        Url::parse(&self.origin)
            .with_context(|| format!("origin is not a valid URL: {}", self.origin))?;

        if self.chain_id == 0 {
            bail!("chain_id must be positive");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be positive");
        }
        if let Some(statement) = &self.statement {
            if statement.contains('\n') {
                bail!("statement must be a single line");
            }
        }
        Ok(())
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            domain: self.domain.clone(),
            origin: self.origin.clone(),
            chain_id: self.chain_id,
            statement: Some(
                self.statement
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STATEMENT.to_string()),
            ),
            mode: self.mode,
            require_metamask: self.require_metamask,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            ..ClientConfig::default()
        }
    }

    pub fn session_dir(&self) -> Result<PathBuf> {
        match &self.session_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| anyhow!("Could not determine data directory"))?
                .join("contriblock")),
        }
    }
}
