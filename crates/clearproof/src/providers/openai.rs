use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::http::{build_client, encode_image, send_json, EncodedImage};
use super::parse::{parse_ocr_response, parse_theme_response};
use super::prompts::{OCR_PROMPT, OCR_SYSTEM, THEMES_PROMPT, THEMES_SYSTEM};
use super::{OcrProvider, ProviderError, TextGenerator, ThemeProvider};
use crate::config::ProviderConfig;
use crate::model::ThemePayload;
use crate::secrets::resolve_secret_optional;

/// Chat/completions client for OpenAI and compatible servers (LM Studio,
/// vLLM, llama.cpp server).
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    /// Set when the provider cannot be used; every call reports it.
    unusable: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

struct Completion<'a> {
    system: &'a str,
    prompt: &'a str,
    image: Option<&'a EncodedImage>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            unusable: None,
        })
    }

    /// Builds the provider from config. The hosted OpenAI endpoint needs a
    /// key; an explicitly configured endpoint may run without one.
    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let (api_key, key_error) = match resolve_secret_optional(config.secret_source()) {
            Ok(key) => (key, None),
            Err(e) => {
                warn!("Could not resolve API key for model {}: {}", config.model, e);
                (None, Some(e.to_string()))
            }
        };

        let mut provider = Self::new(config.endpoint(), &config.model, api_key, timeout)?;
        provider.unusable = match key_error {
            Some(reason) => Some(reason),
            None if provider.api_key.is_none() && config.endpoint.is_none() => Some(
                "openai provider needs one of apiKey, apiKeyFile or apiKeyEnvVar".to_string(),
            ),
            None => None,
        };
        Ok(provider)
    }

    pub fn is_usable(&self) -> bool {
        self.unusable.is_none()
    }

    fn build_request<'a>(&'a self, completion: &'a Completion<'a>) -> ChatRequest<'a> {
        let user_content = match completion.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: completion.prompt,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                },
            ]),
            None => MessageContent::Text(completion.prompt),
        };

        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(completion.system),
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            max_tokens: completion.max_tokens,
            temperature: completion.temperature,
        }
    }

    async fn complete(
        &self,
        completion: Completion<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        if let Some(reason) = &self.unusable {
            return Err(ProviderError::NotConfigured(reason.clone()));
        }
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self.client.post(&url).json(&self.build_request(&completion));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        debug!("chat/completions request to model {}", self.model);
        let response: ChatResponse = send_json(request, cancel).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))
    }
}

#[async_trait]
impl OcrProvider for OpenAiCompatibleProvider {
    async fn extract_text(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        if let Some(reason) = &self.unusable {
            return Err(ProviderError::NotConfigured(reason.clone()));
        }
        let encoded = encode_image(image).await?;
        let text = self
            .complete(
                Completion {
                    system: OCR_SYSTEM,
                    prompt: OCR_PROMPT,
                    image: Some(&encoded),
                    max_tokens: 1000,
                    temperature: 0.0,
                },
                cancel,
            )
            .await?;
        Ok(parse_ocr_response(&text))
    }
}

#[async_trait]
impl ThemeProvider for OpenAiCompatibleProvider {
    async fn extract_themes(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<ThemePayload, ProviderError> {
        if let Some(reason) = &self.unusable {
            return Err(ProviderError::NotConfigured(reason.clone()));
        }
        let encoded = encode_image(image).await?;
        let text = self
            .complete(
                Completion {
                    system: THEMES_SYSTEM,
                    prompt: THEMES_PROMPT,
                    image: Some(&encoded),
                    max_tokens: 400,
                    temperature: 0.2,
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
impl TextGenerator for OpenAiCompatibleProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        self.complete(
            Completion {
                system: system_prompt,
                prompt: user_prompt,
                image: None,
                max_tokens: 600,
                temperature: 0.4,
            },
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    fn config(endpoint: Option<&str>, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            kind: ProviderKind::OpenAi,
            endpoint: endpoint.map(str::to_string),
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.map(str::to_string),
            api_key_file: None,
            api_key_env_var: None,
        }
    }

    #[test]
    fn test_hosted_endpoint_requires_key() {
        let timeout = Duration::from_secs(5);
        assert!(!OpenAiCompatibleProvider::from_config(&config(None, None), timeout)
            .unwrap()
            .is_usable());
        assert!(OpenAiCompatibleProvider::from_config(&config(None, Some("sk-test")), timeout)
            .unwrap()
            .is_usable());
        assert!(
            OpenAiCompatibleProvider::from_config(&config(Some("http://localhost:1234/v1"), None), timeout)
                .unwrap()
                .is_usable()
        );
    }

    #[test]
    fn test_unreadable_key_file_is_unusable() {
        let mut cfg = config(Some("http://localhost:1234/v1"), None);
        cfg.api_key_file = Some("/nonexistent/clearproof/key".to_string());
        let provider = OpenAiCompatibleProvider::from_config(&cfg, Duration::from_secs(5)).unwrap();
        assert!(!provider.is_usable());
    }

    #[test]
    fn test_vision_request_shape() {
        let provider =
            OpenAiCompatibleProvider::new("http://localhost:1234/v1/", "vl", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.endpoint, "http://localhost:1234/v1");

        let image = EncodedImage {
            mime_type: "image/png".to_string(),
            data: "YWJj".to_string(),
        };
        let completion = Completion {
            system: "sys",
            prompt: "read it",
            image: Some(&image),
            max_tokens: 10,
            temperature: 0.0,
        };

        let json = serde_json::to_value(provider.build_request(&completion)).unwrap();
        assert_eq!(json["model"], "vl");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["content"][0]["type"], "text");
        assert_eq!(json["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,YWJj"
        );
    }

    #[test]
    fn test_text_request_shape() {
        let provider =
            OpenAiCompatibleProvider::new("http://localhost:1234/v1", "m", None, Duration::from_secs(5))
                .unwrap();
        let completion = Completion {
            system: "sys",
            prompt: "hello",
            image: None,
            max_tokens: 10,
            temperature: 0.5,
        };
        let json = serde_json::to_value(provider.build_request(&completion)).unwrap();
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_response_decoding() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"[\"a\"]"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("[\"a\"]"));

        let null_content = r#"{"choices":[{"message":{"content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(null_content).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
