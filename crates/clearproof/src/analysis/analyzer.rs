use std::sync::Arc;

use futures_util::future::try_join_all;
use log::debug;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::error::AnalysisError;
use crate::model::{MediaFile, ThemeInsights, ThemePayload};
use crate::providers::{OcrProvider, ProviderError, ThemeProvider};
use crate::sanitize::redact_path;
use crate::storage::FileStorage;

/// Outcome of analyzing one image. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaAnalysisResult {
    pub media_id: String,
    /// Transcribed text; `None` when OCR failed or the image holds no text.
    pub ocr_text: Option<String>,
    pub insights: ThemeInsights,
    /// Flattened tags from the theme answer, kept for the plain-list fallback.
    pub tags: Vec<String>,
    pub ocr_succeeded: bool,
    pub theme_succeeded: bool,
    /// Short tags such as `ocr:Timeout` describing what went wrong.
    pub errors: Vec<String>,
}

impl MediaAnalysisResult {
    pub fn any_success(&self) -> bool {
        self.ocr_succeeded || self.theme_succeeded
    }

    pub fn has_signals(&self) -> bool {
        self.ocr_text.is_some() || self.insights.has_any_data() || !self.tags.is_empty()
    }
}

/// Runs OCR and theme extraction for the images of a submission.
pub struct MediaAnalyzer {
    storage: Arc<dyn FileStorage>,
    ocr: Arc<dyn OcrProvider>,
    themes: Arc<dyn ThemeProvider>,
}

impl MediaAnalyzer {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        ocr: Arc<dyn OcrProvider>,
        themes: Arc<dyn ThemeProvider>,
    ) -> Self {
        Self {
            storage,
            ocr,
            themes,
        }
    }

    /// Analyzes every image in `files` concurrently. Non-image files are
    /// skipped. Only cancellation aborts; provider failures are recorded in
    /// the per-file results.
    pub async fn analyze_all(
        &self,
        files: &[MediaFile],
        cancel: &CancellationToken,
    ) -> Result<Vec<MediaAnalysisResult>, AnalysisError> {
        let tasks = files
            .iter()
            .filter(|file| file.is_image())
            .map(|file| self.analyze(file, cancel));
        try_join_all(tasks).await
    }

    /// Analyzes one image. OCR and theme extraction run concurrently and
    /// fail independently.
    pub async fn analyze(
        &self,
        file: &MediaFile,
        cancel: &CancellationToken,
    ) -> Result<MediaAnalysisResult, AnalysisError> {
        let mut result = MediaAnalysisResult {
            media_id: file.id.clone(),
            ..MediaAnalysisResult::default()
        };

        let path = match self.storage.resolve_physical_path(&file.stored_path) {
            Ok(path) => path,
            Err(e) => {
                debug!("Cannot resolve media {}: {}", file.id, e);
                result.errors.push(format!("storage:{}", e.kind()));
                return Ok(result);
            }
        };

        let span = info_span!("media", media_id = %file.id, filename = %redact_path(&path));
        let (ocr, themes) = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
                pair = async {
                    tokio::join!(
                        self.ocr.extract_text(&path, cancel),
                        self.themes.extract_themes(&path, cancel),
                    )
                } => Ok(pair),
            }
        }
        .instrument(span)
        .await?;

        if matches!(ocr, Err(ProviderError::Cancelled)) || matches!(themes, Err(ProviderError::Cancelled)) {
            return Err(AnalysisError::Cancelled);
        }

        apply_ocr(&mut result, ocr);
        apply_themes(&mut result, themes);
        Ok(result)
    }
}

fn apply_ocr(result: &mut MediaAnalysisResult, outcome: Result<Option<String>, ProviderError>) {
    match outcome {
        Ok(Some(text)) => {
            result.ocr_succeeded = true;
            let text = text.trim();
            if !text.is_empty() {
                result.ocr_text = Some(text.to_string());
            }
        }
        Ok(None) => result.errors.push("ocr:EmptyResponse".to_string()),
        Err(e) => {
            debug!("OCR failed for media {}: {}", result.media_id, e);
            result.errors.push(format!("ocr:{}", e.kind()));
        }
    }
}

fn apply_themes(result: &mut MediaAnalysisResult, outcome: Result<ThemePayload, ProviderError>) {
    match outcome {
        Ok(payload) => {
            result.theme_succeeded = true;
            result.tags = payload.tags();
            result.insights = match payload {
                ThemePayload::Insights(insights) => insights.normalized(),
                // Plain lists stay out of the categorized insights; they feed
                // the flattened-tag fallback instead.
                ThemePayload::Tags(_) => ThemeInsights::default(),
            };
        }
        Err(e) => {
            debug!("Theme extraction failed for media {}: {}", result.media_id, e);
            result.errors.push(format!("themes:{}", e.kind()));
        }
    }
}
