use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.relnote/config.toml`.
///
/// **Security**: This struct NEVER stores API keys, tokens, or secrets.
/// All credentials are read from environment variables at runtime via
/// [`Credentials`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub llm: ProviderConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub docs: DocsConfig,
}

impl Config {
    /// Load config from `~/.relnote/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via
    /// type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.llm.validate()?;
        self.monitor.validate()?;
        self.docs.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".relnote")
            .join("config.toml")
    }

    /// Commented sample config, written by `relnote config --sample`.
    pub fn sample_toml() -> &'static str {
        SAMPLE_CONFIG
    }
}

const SAMPLE_CONFIG: &str = r#"# relnote configuration.
# Credentials are never read from this file. Set them in the environment
# (or a .env file next to the binary):
#   OPENAI_API_KEY / AZURE_OPENAI_API_KEY, RELNOTE_WEBHOOK_URL

[general]
log_level = "info"

[git]
repository_path = "."
default_branch = "main"
cursor_file = ".last_commit"

[llm]
# "openai" or "azure"
provider = "azure"
# Azure resource endpoint or OpenAI-compatible base URL.
# endpoint = "https://my-resource.openai.azure.com"
model = "gpt-5"
deployment = "gpt-5"
api_version = "2024-02-01"
max_tokens = 4000
temperature = 0.3
timeout_secs = 60

[webhook]
enabled = true
# url = "https://outlook.office.com/webhook/..."
channel = "Release Notes"
mention_users = []

[monitor]
interval_secs = 300
max_commits_per_check = 10
error_backoff_secs = 60
# "always_advance" or "hold_on_failure"
cursor_policy = "always_advance"

[docs]
document_path = "CHANGELOG.md"
backup_document = true
output_dir = "."
"#;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Work tree to watch. Must contain a `.git` directory.
    #[serde(default = "default_repository_path")]
    pub repository_path: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Cursor file name, relative to `repository_path` unless absolute.
    #[serde(default = "default_cursor_file")]
    pub cursor_file: String,
}

impl GitConfig {
    /// Resolved location of the progress-cursor file.
    pub fn cursor_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.cursor_file);
        if file.is_absolute() {
            file
        } else {
            PathBuf::from(&self.repository_path).join(file)
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repository_path: default_repository_path(),
            default_branch: default_branch(),
            cursor_file: default_cursor_file(),
        }
    }
}

fn default_repository_path() -> String {
    ".".into()
}
fn default_branch() -> String {
    "main".into()
}
fn default_cursor_file() -> String {
    ".last_commit".into()
}

// ---------------------------------------------------------------------------
// LLM provider settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Azure,
}

/// Provider settings — references env var names, NEVER stores actual keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub provider: ProviderKind,
    /// Azure resource endpoint or OpenAI-compatible base URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Azure deployment name (ignored by the plain OpenAI provider).
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override the env var the API key is read from.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(format!(
                "llm.temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "llm.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the API key from the environment. Honors `api_key_env` when
    /// set, otherwise falls back to the provider's conventional variable.
    pub fn api_key(&self) -> Option<String> {
        if let Some(var) = &self.api_key_env {
            return Credentials::from_env(var);
        }
        match self.provider {
            ProviderKind::OpenAi => Credentials::openai_api_key(),
            ProviderKind::Azure => Credentials::azure_api_key(),
        }
    }

    /// Resolve the endpoint: config first, then the conventional env var.
    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint
            .clone()
            .or_else(|| Credentials::from_env("AZURE_OPENAI_ENDPOINT"))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_kind(),
            endpoint: None,
            model: default_model(),
            deployment: default_deployment(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            api_key_env: None,
        }
    }
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::Azure
}
fn default_model() -> String {
    "gpt-5".into()
}
fn default_deployment() -> String {
    "gpt-5".into()
}
fn default_api_version() -> String {
    "2024-02-01".into()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f32 {
    0.3
}
fn default_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Webhook settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Incoming-webhook URL. `RELNOTE_WEBHOOK_URL` overrides this.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Names prepended as mentions to every notification.
    #[serde(default)]
    pub mention_users: Vec<String>,
}

impl WebhookConfig {
    /// Resolve the webhook URL: env var first, then config.
    pub fn resolved_url(&self) -> Option<String> {
        Credentials::webhook_url().or_else(|| self.url.clone())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            channel: default_channel(),
            mention_users: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_channel() -> String {
    "Release Notes".into()
}

// ---------------------------------------------------------------------------
// Monitor settings
// ---------------------------------------------------------------------------

/// What to do with the progress cursor when some commits in a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Advance past every attempted commit. A permanently failing commit is
    /// logged once and left behind instead of blocking the loop.
    AlwaysAdvance,
    /// Keep the old cursor when any commit failed, so the whole batch is
    /// retried next interval. Commits that already succeeded will be
    /// reprocessed and may publish twice.
    HoldOnFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_commits")]
    pub max_commits_per_check: usize,
    #[serde(default = "default_backoff_secs")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_cursor_policy")]
    pub cursor_policy: CursorPolicy,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "monitor.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.interval_secs < 60 {
            tracing::warn!(
                interval_secs = self.interval_secs,
                "monitor.interval_secs below 60 will poll aggressively"
            );
        }
        if self.max_commits_per_check == 0 {
            return Err(ConfigError::Validation(
                "monitor.max_commits_per_check must be greater than zero".to_string(),
            ));
        }
        if self.error_backoff_secs == 0 {
            return Err(ConfigError::Validation(
                "monitor.error_backoff_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_commits_per_check: default_max_commits(),
            error_backoff_secs: default_backoff_secs(),
            cursor_policy: default_cursor_policy(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}
fn default_max_commits() -> usize {
    10
}
fn default_backoff_secs() -> u64 {
    60
}
fn default_cursor_policy() -> CursorPolicy {
    CursorPolicy::AlwaysAdvance
}

// ---------------------------------------------------------------------------
// Docs settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Living document updated by gated commits, relative to the repository
    /// root unless absolute.
    #[serde(default = "default_document_path")]
    pub document_path: String,
    /// Write a one-time `.bak` copy before the document's first modification.
    #[serde(default = "default_true")]
    pub backup_document: bool,
    /// Directory manual-mode artifacts are written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Keywords whose presence in a commit message passes the update gate.
    #[serde(default = "default_significance_keywords")]
    pub significance_keywords: Vec<String>,
    /// Directory names skipped by the docs walk.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
    /// File extensions (without dot) included in the docs walk.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

impl DocsConfig {
    /// Resolved location of the living document.
    pub fn resolved_document_path(&self, repository_path: &str) -> PathBuf {
        resolve_against(repository_path, &self.document_path)
    }

    /// Resolved directory for manual-mode artifacts and generated docs.
    pub fn resolved_output_dir(&self, repository_path: &str) -> PathBuf {
        resolve_against(repository_path, &self.output_dir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "docs.document_path must not be empty".to_string(),
            ));
        }
        if self.significance_keywords.is_empty() {
            return Err(ConfigError::Validation(
                "docs.significance_keywords must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            document_path: default_document_path(),
            backup_document: true,
            output_dir: default_output_dir(),
            significance_keywords: default_significance_keywords(),
            ignore_patterns: default_ignore_patterns(),
            source_extensions: default_source_extensions(),
        }
    }
}

fn resolve_against(repository_path: &str, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        PathBuf::from(repository_path).join(path)
    }
}

fn default_document_path() -> String {
    "CHANGELOG.md".into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_significance_keywords() -> Vec<String> {
    crate::gate::DEFAULT_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}
fn default_ignore_patterns() -> Vec<String> {
    [
        ".git",
        "target",
        "node_modules",
        "__pycache__",
        ".venv",
        ".idea",
        ".vscode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_source_extensions() -> Vec<String> {
    ["rs", "py", "js", "ts", "go", "toml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Credentials — reads secrets from environment at runtime
// ---------------------------------------------------------------------------

/// Reads credentials from environment variables at runtime.
/// Config stores env var *names* at most; values are resolved on demand and
/// never written back to disk.
pub struct Credentials;

impl Credentials {
    /// Read the OpenAI API key from the `OPENAI_API_KEY` env var.
    pub fn openai_api_key() -> Option<String> {
        std::env::var("OPENAI_API_KEY").ok()
    }

    /// Read the Azure OpenAI API key from the `AZURE_OPENAI_API_KEY` env var.
    pub fn azure_api_key() -> Option<String> {
        std::env::var("AZURE_OPENAI_API_KEY").ok()
    }

    /// Read the webhook URL from the `RELNOTE_WEBHOOK_URL` env var.
    pub fn webhook_url() -> Option<String> {
        std::env::var("RELNOTE_WEBHOOK_URL").ok()
    }

    /// Read a credential from a named env var.
    pub fn from_env(var_name: &str) -> Option<String> {
        std::env::var(var_name).ok()
    }

    /// Which credential sources are present, for `config --status` output.
    pub fn available() -> Vec<&'static str> {
        let mut present = Vec::new();
        if Self::openai_api_key().is_some() {
            present.push("openai");
        }
        if Self::azure_api_key().is_some() {
            present.push("azure");
        }
        if Self::webhook_url().is_some() {
            present.push("webhook");
        }
        present
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
