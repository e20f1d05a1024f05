use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use healthsense_core::AgentRuntimeConfig;

pub const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Tried in order once the primary model keeps failing
    #[serde(default)]
    pub fallbacks: Vec<FallbackConfig>,
}

/// Secondary OpenAI-compatible endpoint; empty fields reuse the primary's
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
}

impl std::fmt::Debug for FallbackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackConfig")
            .field("model", &self.model)
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}

impl LlmConfig {
    pub fn api_key_set(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Fallbacks with blank fields filled in from the primary
    pub fn resolved_fallbacks(&self) -> Vec<FallbackConfig> {
        self.fallbacks
            .iter()
            .filter(|f| !f.model.trim().is_empty())
            .map(|f| FallbackConfig {
                model: f.model.clone(),
                api_key: if f.api_key.trim().is_empty() {
                    self.api_key.clone()
                } else {
                    f.api_key.clone()
                },
                base_url: if f.base_url.trim().is_empty() {
                    self.base_url.clone()
                } else {
                    f.base_url.clone()
                },
            })
            .collect()
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_base_url() -> String {
    healthsense_core::providers::openai::DEFAULT_BASE_URL.to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout_secs(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl AgentsConfig {
    pub fn runtime(&self) -> AgentRuntimeConfig {
        AgentRuntimeConfig {
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            max_iterations: self.max_iterations.max(1),
        }
    }
}

fn default_query_timeout_secs() -> u64 {
    300
}
fn default_max_iterations() -> usize {
    10
}

/// Dataset locations; relative paths resolve against the working directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub diagnostic_csv: String,
    pub hospital_csv: String,
    pub emergency_csv: String,
    pub doctors_csv: String,
    pub slots_csv: String,
    pub emergency_db: String,
    pub appointments_db: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            diagnostic_csv: "data/Hospital_Information_with_Lab_Tests.csv".to_string(),
            hospital_csv: "data/Hospital_General_Information.csv".to_string(),
            emergency_csv: "data/hospitals_emergency_data.csv".to_string(),
            doctors_csv: "data/doctors_info_data.csv".to_string(),
            slots_csv: "data/doctors_slots_data.csv".to_string(),
            emergency_db: "data/emergency.db".to_string(),
            appointments_db: "data/appointments.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7860
}
fn default_static_dir() -> String {
    "static".to_string()
}

/// Mask a secret for display: first 3 and last 4 chars of longer keys, otherwise "***"
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".healthsense")
}

impl HealthConfig {
    /// Load `custom_path`, else `~/.healthsense/config.toml`, else the built-in defaults
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        if let Some(path) = custom_path {
            return Self::from_file(path);
        }

        let path = config_dir().join("config.toml");
        if path.exists() {
            Self::from_file(&path)
        } else {
            debug!("No config at {}, using built-in defaults", path.display());
            Self::builtin()
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_CONFIG).context("Built-in config is invalid")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `healthsense init` first.",
                path.display()
            )
        })?;
        Self::parse(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(&expand_env_vars(content))?;

        if config.llm.model.trim().is_empty() {
            config.llm.model = default_model();
        }
        if config.llm.api_key.starts_with("sk-") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{OPENAI_API_KEY}}\""
            );
        }
        Ok(config)
    }

    /// Copy safe to print
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.llm.api_key = mask_secret(&self.llm.api_key);
        for fallback in &mut copy.llm.fallbacks {
            fallback.api_key = mask_secret(&fallback.api_key);
        }
        copy
    }
}

/// Environment variables that config files may reference as `${VAR}`
const ALLOWED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "MODEL_NAME",
    "HEALTHSENSE_DATA_DIR",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while let Some(start) = result[pos..].find("${") {
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = &result[abs_start + 2..abs_start + end];

        if !ALLOWED_ENV_VARS.contains(&var_name) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(var_name).unwrap_or_default();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value.len();
    }
    result
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(s: &str) -> PathBuf {
    match (s.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(s),
    }
}
