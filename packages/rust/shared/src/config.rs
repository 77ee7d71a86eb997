//! Application configuration for manualchat.
//!
//! User config lives at `~/.manualchat/manualchat.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ManualChatError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "manualchat.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".manualchat";

/// Upper bound on upstream retries before the first fragment.
pub const MAX_RETRY_ATTEMPTS: u32 = 1;

// ---------------------------------------------------------------------------
// Config structs (matching manualchat.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Where attached documents live on disk.
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Product catalog database.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Upstream completion service.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Streaming response behaviour.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Context assembly.
    #[serde(default)]
    pub context: ContextConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

/// `[documents]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Local directory that document URLs resolve under.
    #[serde(default = "default_documents_root")]
    pub root: String,

    /// URL path prefix stripped before joining onto `root`.
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            url_prefix: default_url_prefix(),
        }
    }
}

fn default_documents_root() -> String {
    "./uploads".into()
}
fn default_url_prefix() -> String {
    "/uploads/".into()
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// libSQL database file holding product metadata.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.manualchat/catalog.db".into()
}

/// `[upstream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout for establishing the stream.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Retries allowed before the first fragment (clamped to 1).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl UpstreamConfig {
    /// Retry budget, never more than [`MAX_RETRY_ATTEMPTS`].
    pub fn effective_retries(&self) -> u32 {
        self.retry_attempts.min(MAX_RETRY_ATTEMPTS)
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.3
}
fn default_retry_attempts() -> u32 {
    1
}

/// `[stream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Emit an `event: error` frame when the upstream fails mid-stream.
    #[serde(default = "default_true")]
    pub error_frame: bool,

    /// Frames buffered between the relay task and the HTTP body.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            error_frame: true,
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    16
}

/// `[context]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Log a warning when the composed context exceeds this many characters.
    /// Nothing is truncated.
    #[serde(default = "default_warn_chars")]
    pub warn_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            warn_chars: default_warn_chars(),
        }
    }
}

fn default_warn_chars() -> usize {
    48_000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.manualchat/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ManualChatError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.manualchat/manualchat.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ManualChatError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ManualChatError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ManualChatError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ManualChatError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ManualChatError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the upstream API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.upstream.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ManualChatError::config(format!(
            "upstream API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| ManualChatError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
