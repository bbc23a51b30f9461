//! External inference providers: OCR, theme extraction, text generation.
//!
//! Every call takes the caller's `CancellationToken` and returns
//! [`ProviderError::Cancelled`] as soon as it fires. Callers decide how to
//! degrade on the other errors; only [`ProviderError::NotConfigured`] is
//! meant to reach the user.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{ProviderConfig, ProviderKind, ProvidersConfig};
use crate::model::ThemePayload;

mod http;
mod ollama;
mod openai;
pub mod parse;
pub mod prompts;

pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// Missing credentials or an unusable provider setup.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read media file '{file}': {source}")]
    ReadMedia {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Short tag used in per-file error lists, e.g. `Timeout`.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "NotConfigured",
            ProviderError::Request(_) => "Request",
            ProviderError::Timeout => "Timeout",
            ProviderError::Status { .. } => "Status",
            ProviderError::InvalidResponse(_) => "InvalidResponse",
            ProviderError::ReadMedia { .. } => "ReadMedia",
            ProviderError::Cancelled => "Cancelled",
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderError::NotConfigured(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Request(e.without_url().to_string())
        }
    }
}

/// Reads the text in an image.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Returns the text in reading order. `Ok(Some(""))` means the image was
    /// read and holds no text; `Ok(None)` means the provider gave no usable
    /// answer.
    async fn extract_text(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError>;
}

/// Describes the visual themes of an image.
#[async_trait]
pub trait ThemeProvider: Send + Sync {
    async fn extract_themes(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<ThemePayload, ProviderError>;
}

/// Short free-text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;
}

/// Stand-in used when a capability is switched off; every call fails with
/// `NotConfigured`.
#[derive(Debug, Clone)]
pub struct DisabledProvider {
    reason: String,
}

impl DisabledProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl OcrProvider for DisabledProvider {
    async fn extract_text(
        &self,
        _image: &Path,
        _cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[async_trait]
impl ThemeProvider for DisabledProvider {
    async fn extract_themes(
        &self,
        _image: &Path,
        _cancel: &CancellationToken,
    ) -> Result<ThemePayload, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

#[async_trait]
impl TextGenerator for DisabledProvider {
    async fn generate(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

/// The vision half of the provider setup: one backend serving both OCR and
/// theme extraction.
#[derive(Clone)]
pub struct VisionProviders {
    pub ocr: Arc<dyn OcrProvider>,
    pub themes: Arc<dyn ThemeProvider>,
}

/// Builds the OCR and theme providers from the `vision` block.
pub fn create_vision_provider(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<VisionProviders, ProviderError> {
    let providers = match config.kind {
        ProviderKind::OpenAi => {
            let provider = Arc::new(OpenAiCompatibleProvider::from_config(config, timeout)?);
            VisionProviders {
                ocr: provider.clone(),
                themes: provider,
            }
        }
        ProviderKind::Ollama => {
            let provider = Arc::new(OllamaProvider::from_config(config, timeout)?);
            VisionProviders {
                ocr: provider.clone(),
                themes: provider,
            }
        }
    };

    log::info!(
        "Vision provider: {} ({}) at {}",
        config.kind.as_str(),
        config.model,
        crate::sanitize::redact_endpoint(config.endpoint())
    );
    Ok(providers)
}

/// Builds the text generator from the `text` block.
pub fn create_text_provider(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn TextGenerator>, ProviderError> {
    let provider: Arc<dyn TextGenerator> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiCompatibleProvider::from_config(config, timeout)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config, timeout)?),
    };

    log::info!(
        "Text provider: {} ({}) at {}",
        config.kind.as_str(),
        config.model,
        crate::sanitize::redact_endpoint(config.endpoint())
    );
    Ok(provider)
}

/// Every provider the pipeline talks to.
#[derive(Clone)]
pub struct Providers {
    pub ocr: Arc<dyn OcrProvider>,
    pub themes: Arc<dyn ThemeProvider>,
    pub text: Arc<dyn TextGenerator>,
}

impl Providers {
    pub fn from_config(config: &ProvidersConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let vision = create_vision_provider(&config.vision, timeout)?;
        let text = create_text_provider(&config.text, timeout)?;
        Ok(Self {
            ocr: vision.ocr,
            themes: vision.themes,
            text,
        })
    }
}
