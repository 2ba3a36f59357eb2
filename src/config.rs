//! Configuration file handling for tally.
//!
//! The configuration file is stored at `$TALLY_HOME/config.json` and contains settings for the
//! language model service, backup settings and authentication file paths.

use crate::backup::Backup;
use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "tally";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const SECRETS: &str = ".secrets";
const BACKUPS: &str = ".backups";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const LLM_BASE_URL: &str = "https://api.openai.com";
const LLM_MODEL: &str = "gpt-4o-mini";
const LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$TALLY_HOME` and from there it loads `$TALLY_HOME/config.json`. It provides paths
/// to other items that are either configurable or are expected in a certain location within the
/// home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its subdirectories and:
    /// - Creates an initial `config.json` file with default settings
    /// - Copies `secret_file` into its default location in the home directory.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of home directory, e.g. `$HOME/tally`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON for the Google Sheets
    ///   API. This will be copied to `.secrets/client_secret.json`.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub(crate) async fn create(dir: impl Into<PathBuf>, secret_file: &Path) -> Res<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the tally home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups_dir = root.join(BACKUPS);
        utils::make_dir(&backups_dir).await?;
        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        utils::copy(secret_file, secrets_dir.join(CLIENT_SECRET_JSON)).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            backups: backups_dir,
            secrets: secrets_dir,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `tally_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the backups and secrets directories exist
    /// - return the loaded configuration object
    pub async fn load(tally_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(tally_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The tally home directory is missing, run 'tally init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            root: root.clone(),
            backups: root.join(BACKUPS),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
        };
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    pub fn llm_base_url(&self) -> &str {
        &self.config_file.llm_base_url
    }

    pub fn llm_model(&self) -> &str {
        &self.config_file.llm_model
    }

    /// The name of the environment variable that holds the language model API key.
    pub fn llm_api_key_env(&self) -> &str {
        &self.config_file.llm_api_key_env
    }

    /// Creates a new `Backup` instance for managing snapshot files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative
    /// path against the home directory.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path
    /// against the home directory.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "tally",
///   "config_version": 1,
///   "backup_copies": 5,
///   "llm_base_url": "https://api.openai.com",
///   "llm_model": "gpt-4o-mini",
///   "llm_api_key_env": "OPENAI_API_KEY",
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "tally"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Number of snapshot copies to keep per prefix
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,

    /// Base URL of an OpenAI-compatible chat completions service
    #[serde(default = "default_llm_base_url")]
    llm_base_url: String,

    /// Model name sent with each completion request
    #[serde(default = "default_llm_model")]
    llm_model: String,

    /// Environment variable that holds the API key for the model service
    #[serde(default = "default_llm_api_key_env")]
    llm_api_key_env: String,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to the home directory or
    /// absolute). Defaults to $TALLY_HOME/.secrets/client_secret.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to the home directory or absolute).
    /// Defaults to $TALLY_HOME/.secrets/token.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_backup_copies() -> u32 {
    BACKUP_COPIES
}

fn default_llm_base_url() -> String {
    LLM_BASE_URL.to_string()
}

fn default_llm_model() -> String {
    LLM_MODEL.to_string()
}

fn default_llm_api_key_env() -> String {
    LLM_API_KEY_ENV.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            backup_copies: BACKUP_COPIES,
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            llm_api_key_env: default_llm_api_key_env(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, if `app_name` is wrong, or if
    /// `llm_base_url` is not a URL.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Url::parse(&config.llm_base_url).with_context(|| {
            format!(
                "Invalid llm_base_url in config file: '{}'",
                config.llm_base_url
            )
        })?;

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path.as_ref(), data)
            .await
            .context("Unable to write config file")
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}
