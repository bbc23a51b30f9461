use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::http::{build_client, encode_image, send_json};
use super::parse::{parse_ocr_response, parse_theme_response};
use super::prompts::{OCR_PROMPT, OCR_SYSTEM, THEMES_PROMPT, THEMES_SYSTEM};
use super::{OcrProvider, ProviderError, TextGenerator, ThemeProvider};
use crate::config::ProviderConfig;
use crate::model::ThemePayload;
use crate::secrets::resolve_secret_optional;

/// Client for a local or remote Ollama server (`/api/generate`).
pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    /// Only needed when Ollama sits behind an authenticating proxy.
    api_key: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        })
    }

    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let mut provider = Self::new(config.endpoint(), &config.model, timeout)?;
        provider.api_key = match resolve_secret_optional(config.secret_source()) {
            Ok(key) => key,
            Err(e) => {
                // The key is optional for Ollama; keep going without it.
                warn!("Ignoring unresolvable Ollama API key: {}", e);
                None
            }
        };
        Ok(provider)
    }

    async fn generate_raw(
        &self,
        system: &str,
        prompt: &str,
        images: Vec<String>,
        options: GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            images,
            stream: false,
            options,
        };

        let url = format!("{}/api/generate", self.endpoint);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        debug!("Ollama generate request to model {}", self.model);
        let response: GenerateResponse = send_json(request, cancel).await?;
        Ok(response.response)
    }
}

#[async_trait]
impl OcrProvider for OllamaProvider {
    async fn extract_text(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        let encoded = encode_image(image).await?;
        let text = self
            .generate_raw(
                OCR_SYSTEM,
                OCR_PROMPT,
                vec![encoded.data],
                GenerateOptions {
                    temperature: 0.0,
                    num_predict: 1000,
                },
                cancel,
            )
            .await?;
        Ok(parse_ocr_response(&text))
    }
}

#[async_trait]
impl ThemeProvider for OllamaProvider {
    async fn extract_themes(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<ThemePayload, ProviderError> {
        let encoded = encode_image(image).await?;
        let text = self
            .generate_raw(
                THEMES_SYSTEM,
                THEMES_PROMPT,
                vec![encoded.data],
                GenerateOptions {
                    temperature: 0.2,
                    num_predict: 400,
                },
                cancel,
            )
            .await?;
        parse_theme_response(&text).ok_or_else(|| {
            ProviderError::InvalidResponse("theme answer is neither JSON nor a tag list".to_string())
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        self.generate_raw(
            system_prompt,
            user_prompt,
            Vec::new(),
            GenerateOptions {
                temperature: 0.4,
                num_predict: 600,
            },
            cancel,
        )
        .await
    }
}
