use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    pub storage_root: String,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Config {
    /// Database location, falling back to `~/.clearproof/data/clearproof.db`.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(crate::secrets::expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }

    pub fn resolved_storage_root(&self) -> PathBuf {
        PathBuf::from(crate::secrets::expand_home(&self.storage_root))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    #[serde(default = "default_backfill_delay_secs")]
    pub backfill_delay_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_queue_warning_threshold")]
    pub queue_warning_threshold: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

fn default_backfill_delay_secs() -> u64 {
    10
}

fn default_stale_after_secs() -> u64 {
    300
}

fn default_queue_warning_threshold() -> usize {
    100
}

fn default_provider_timeout_secs() -> u64 {
    120
}

impl AnalysisConfig {
    pub fn backfill_delay(&self) -> Duration {
        Duration::from_secs(self.backfill_delay_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backfill_delay_secs: default_backfill_delay_secs(),
            stale_after_secs: default_stale_after_secs(),
            queue_warning_threshold: default_queue_warning_threshold(),
            provider_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Answers OCR and theme requests.
    pub vision: ProviderConfig,
    /// Generates summaries and rationales.
    pub text: ProviderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat/completions or any compatible server (LM Studio, vLLM).
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env_var: Option<String>,
}

impl ProviderConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
            .trim_end_matches('/')
    }

    pub fn secret_source(&self) -> SecretSource<'_> {
        SecretSource {
            direct: self.api_key.as_deref(),
            file_path: self.api_key_file.as_deref(),
            env_var: self.api_key_env_var.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Score added per tag shared with previously approved content.
    #[serde(default = "default_tag_weight")]
    pub tag_weight: f64,
    /// Score added (or removed) per matched summary phrase.
    #[serde(default = "default_phrase_weight")]
    pub phrase_weight: f64,
}

fn default_tag_weight() -> f64 {
    0.2
}

fn default_phrase_weight() -> f64 {
    0.1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tag_weight: default_tag_weight(),
            phrase_weight: default_phrase_weight(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryConfig {
    /// Development mode: ignore cached summaries and regenerate every call.
    #[serde(default)]
    pub always_refresh: bool,
}
