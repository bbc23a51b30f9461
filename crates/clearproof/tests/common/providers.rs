//! Scripted stand-ins for the inference providers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use clearproof::model::{ThemeInsights, ThemePayload};
use clearproof::providers::{OcrProvider, ProviderError, TextGenerator, ThemeProvider};

/// Scripted answer for one image.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Tags(Vec<String>),
    Insights(ThemeInsights),
    Timeout,
    /// Blocks until the call is cancelled.
    Hang,
}

impl Reply {
    pub fn text(value: &str) -> Self {
        Reply::Text(value.to_string())
    }

    pub fn tags(values: &[&str]) -> Self {
        Reply::Tags(values.iter().map(|v| v.to_string()).collect())
    }
}

/// Vision provider answering by image file name. Unscripted images have
/// no text and no tags.
#[derive(Default)]
pub struct ScriptedVision {
    ocr: Mutex<HashMap<String, Reply>>,
    themes: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
}

impl ScriptedVision {
    pub fn set_ocr(&self, file_name: &str, reply: Reply) {
        self.ocr.lock().unwrap().insert(file_name.to_string(), reply);
    }

    pub fn set_themes(&self, file_name: &str, reply: Reply) {
        self.themes.lock().unwrap().insert(file_name.to_string(), reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply_for(&self, table: &Mutex<HashMap<String, Reply>>, image: &Path) -> Option<Reply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = image.file_name()?.to_string_lossy().to_string();
        table.lock().unwrap().get(&name).cloned()
    }
}

#[async_trait]
impl OcrProvider for ScriptedVision {
    async fn extract_text(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        match self.reply_for(&self.ocr, image) {
            Some(Reply::Text(text)) => Ok(Some(text)),
            Some(Reply::Timeout) => Err(ProviderError::Timeout),
            Some(Reply::Hang) => {
                cancel.cancelled().await;
                Err(ProviderError::Cancelled)
            }
            Some(_) | None => Ok(Some(String::new())),
        }
    }
}

#[async_trait]
impl ThemeProvider for ScriptedVision {
    async fn extract_themes(
        &self,
        image: &Path,
        cancel: &CancellationToken,
    ) -> Result<ThemePayload, ProviderError> {
        match self.reply_for(&self.themes, image) {
            Some(Reply::Tags(tags)) => Ok(ThemePayload::Tags(tags)),
            Some(Reply::Insights(insights)) => Ok(ThemePayload::Insights(insights)),
            Some(Reply::Timeout) => Err(ProviderError::Timeout),
            Some(Reply::Hang) => {
                cancel.cancelled().await;
                Err(ProviderError::Cancelled)
            }
            Some(Reply::Text(_)) | None => Ok(ThemePayload::Tags(Vec::new())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// Answers every summary and rationale prompt with fixed content.
    Fixed,
    /// Reports missing credentials.
    NotConfigured,
    /// Fails like an unreachable server.
    Failing,
    /// Answers with prose instead of JSON.
    Garbage,
}

pub const STYLE_REPLY: &str = r#"["bold colors", "summer vibe", "clean type"]"#;
pub const POSITIVES_REPLY: &str = "```json\n[\"bright palette\", \"strong logo\"]\n```";
pub const REJECTIONS_REPLY: &str = r#"["cluttered layout", "dark tones"]"#;
pub const RATIONALE_REPLY: &str = "This looks like a good fit for the client.";

/// Text generator answering by prompt topic.
pub struct ScriptedText {
    mode: Mutex<TextMode>,
    calls: AtomicUsize,
}

impl ScriptedText {
    pub fn new(mode: TextMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: TextMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let mode = *self.mode.lock().unwrap();
        match mode {
            TextMode::NotConfigured => Err(ProviderError::NotConfigured(
                "text provider has no API key".to_string(),
            )),
            TextMode::Failing => Err(ProviderError::Request("connection refused".to_string())),
            TextMode::Garbage => Ok("I am not sure what you mean.".to_string()),
            TextMode::Fixed => {
                let reply = if user_prompt.contains("stylistic preferences") {
                    STYLE_REPLY
                } else if user_prompt.contains("repeatedly praises") {
                    POSITIVES_REPLY
                } else if user_prompt.contains("rejects work") {
                    REJECTIONS_REPLY
                } else {
                    RATIONALE_REPLY
                };
                Ok(reply.to_string())
            }
        }
    }
}
