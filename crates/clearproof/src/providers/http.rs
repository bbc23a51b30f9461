use std::path::Path;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::ProviderError;
use crate::sanitize::{redact_path, truncate_body};

const USER_AGENT: &str = concat!("clearproof/", env!("CARGO_PKG_VERSION"));

pub(super) fn build_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("failed to build HTTP client: {}", e)))
}

/// Sends a request and decodes the JSON body, racing the whole exchange
/// against `cancel`.
pub(super) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T, ProviderError> {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "{} (body: {})",
                e,
                truncate_body(&String::from_utf8_lossy(&bytes))
            ))
        })
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = exchange => result,
    }
}

/// A base64-encoded image ready for a vision request.
#[derive(Debug)]
pub(super) struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

pub(super) async fn encode_image(path: &Path) -> Result<EncodedImage, ProviderError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProviderError::ReadMedia {
            file: redact_path(path),
            source: e,
        })?;

    let mime_type = mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string());

    Ok(EncodedImage {
        mime_type,
        data: BASE64.encode(bytes),
    })
}
