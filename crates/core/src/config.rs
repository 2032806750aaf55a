//! Configuration loaded from TOML.
//!
//! Every section has conservative defaults, so an empty file is a valid
//! configuration. String values may reference environment variables as
//! `${NAME}`; they are expanded before parsing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::Path, time::Duration};

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream provider settings.
    pub provider: ProviderConfig,
    /// Quota tiers.
    pub quota: QuotaConfig,
    /// Retry policy.
    pub retry: RetryConfig,
    /// Per-session limits.
    pub session: SessionConfig,
    /// Model registry settings.
    pub registry: RegistryConfig,
    /// Settings passed through to collaborators.
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Parse a TOML string, expanding `${ENV}` references first.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let expanded = expand_env_vars(toml_str);
        let config: Self = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// The configured credential, falling back to `GEMINI_API_KEY`.
    ///
    /// Empty values (e.g. an unset `${VAR}`) count as missing.
    pub fn api_key(&self) -> Option<ApiKey> {
        self.provider
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| {
                std::env::var(API_KEY_ENV)
                    .ok()
                    .map(ApiKey::from)
                    .filter(|key| !key.is_empty())
            })
    }
}

/// A provider credential.
///
/// `Debug` never prints the value; use [`ApiKey::expose`] at the one place
/// the key is put on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// The raw credential.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Upstream provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Credential (supports `${ENV_VAR}` expansion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,
    /// Override of the API base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Safety thresholds sent with every request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety: Vec<SafetySetting>,
}

/// A provider safety threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    /// Harm category, e.g. `HARM_CATEGORY_HARASSMENT`.
    pub category: String,
    /// Block threshold, e.g. `BLOCK_NONE`.
    pub threshold: String,
}

/// Quota tiers: a default plus per-model overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Longest a call may wait for admission before failing.
    pub wait_ceiling_secs: u64,
    /// Limits for models without an override.
    #[serde(rename = "default")]
    pub default_limits: QuotaLimits,
    /// Per-model overrides, keyed by model id.
    pub models: BTreeMap<String, QuotaLimits>,
}

impl QuotaConfig {
    /// Limits for `model`; ids match with or without the `models/` prefix.
    pub fn limits_for(&self, model: &str) -> QuotaLimits {
        let short = model.strip_prefix("models/").unwrap_or(model);
        self.models
            .iter()
            .find(|(id, _)| id.strip_prefix("models/").unwrap_or(id) == short)
            .map(|(_, limits)| limits.clone())
            .unwrap_or_else(|| self.default_limits.clone())
    }

    /// Admission wait ceiling.
    pub fn wait_ceiling(&self) -> Duration {
        Duration::from_secs(self.wait_ceiling_secs)
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            wait_ceiling_secs: 60,
            default_limits: QuotaLimits::default(),
            models: BTreeMap::new(),
        }
    }
}

/// Capacity of one model's quota windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaLimits {
    /// Requests allowed per request window.
    pub requests: u32,
    /// Request window length.
    pub request_window_secs: u64,
    /// Tokens allowed per token window.
    pub tokens: u64,
    /// Token window length.
    pub token_window_secs: u64,
}

impl QuotaLimits {
    /// Request window length.
    pub fn request_window(&self) -> Duration {
        Duration::from_secs(self.request_window_secs)
    }

    /// Token window length.
    pub fn token_window(&self) -> Duration {
        Duration::from_secs(self.token_window_secs)
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            requests: 10,
            request_window_secs: 60,
            tokens: 1_000_000,
            token_window_secs: 86_400,
        }
    }
}

/// Retry policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay_ms: u64,
    /// Upper bound of a single delay.
    pub max_delay_ms: u64,
    /// Upper bound of the time spent across all attempts.
    pub max_elapsed_secs: u64,
    /// Randomize delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_elapsed_secs: 60,
            jitter: true,
        }
    }
}

/// Per-session limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Total time budget of one call, across all attempts.
    pub timeout_secs: u64,
    /// MIME types accepted as attachments.
    pub allowed_mime_types: Vec<String>,
    /// Upper bound of the attachment payload of one request.
    pub max_inline_bytes: usize,
    /// Chunks buffered between a stream and its collaborator.
    pub stream_buffer: usize,
}

impl SessionConfig {
    /// Session time budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether `mime` is an accepted attachment type.
    ///
    /// Entries ending in `/*` accept a whole family.
    pub fn accepts(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|allowed| {
            match allowed.strip_suffix("/*") {
                Some(family) => mime
                    .split_once('/')
                    .is_some_and(|(head, _)| head.eq_ignore_ascii_case(family)),
                None => allowed.eq_ignore_ascii_case(&mime),
            }
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            allowed_mime_types: [
                "image/png",
                "image/jpeg",
                "image/webp",
                "image/heic",
                "image/heif",
                "application/pdf",
                "text/plain",
                "text/csv",
                "text/markdown",
            ]
            .into_iter()
            .map(Into::into)
            .collect(),
            max_inline_bytes: 20 * 1024 * 1024,
            stream_buffer: 32,
        }
    }
}

/// Model registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Models listed first, in this order.
    pub priority: Vec<String>,
    /// How long a fetched listing stays fresh.
    pub cache_ttl_secs: u64,
}

impl RegistryConfig {
    /// Cache time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                "models/gemini-1.5-flash-latest".into(),
                "models/gemini-1.5-pro-latest".into(),
                "models/gemini-pro-latest".into(),
            ],
            cache_ttl_secs: 300,
        }
    }
}

/// Settings the core does not interpret; collaborators read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// File extensions a collaborator may attach or scan.
    pub allowed_extensions: Vec<String>,
    /// Folder names skipped when scanning projects.
    pub ignore_folders: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: [
                ".py", ".js", ".ts", ".html", ".css", ".json", ".sql", ".md", ".java", ".c",
                ".cpp", ".txt", ".cs", ".go", ".rs",
            ]
            .into_iter()
            .map(Into::into)
            .collect(),
            ignore_folders: [
                ".git",
                "__pycache__",
                "venv",
                "env",
                "node_modules",
                ".idea",
                ".vscode",
                "dist",
                "build",
                "bin",
                "obj",
            ]
            .into_iter()
            .map(Into::into)
            .collect(),
        }
    }
}

/// Expand `${VAR}` references with values from the environment.
///
/// Unset variables expand to the empty string.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}
