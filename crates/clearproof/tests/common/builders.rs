//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};

use clearproof::model::{AnalysisStatus, FeatureUpdate, Review, ReviewDecision, ThemeInsights};

/// One media file of a submission under construction.
#[derive(Debug, Clone)]
pub struct MediaSpec {
    pub file_name: String,
    pub content_type: String,
    pub caption: Option<String>,
}

/// Builder for submissions seeded through [`crate::common::TestHarness::seed`].
#[derive(Debug, Clone)]
pub struct SubmissionBuilder {
    pub id: String,
    pub client_id: String,
    pub owner_user_id: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub media: Vec<MediaSpec>,
}

impl SubmissionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            client_id: "acme".to_string(),
            owner_user_id: "designer-1".to_string(),
            message: None,
            created_at: Utc::now() - Duration::hours(1),
            media: Vec::new(),
        }
    }

    pub fn client(mut self, client_id: &str) -> Self {
        self.client_id = client_id.to_string();
        self
    }

    pub fn owner(mut self, user_id: &str) -> Self {
        self.owner_user_id = user_id.to_string();
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn image(mut self, file_name: &str) -> Self {
        self.media.push(MediaSpec {
            file_name: file_name.to_string(),
            content_type: "image/png".to_string(),
            caption: None,
        });
        self
    }

    pub fn video(mut self, file_name: &str) -> Self {
        self.media.push(MediaSpec {
            file_name: file_name.to_string(),
            content_type: "video/mp4".to_string(),
            caption: None,
        });
        self
    }
}

/// Builder for feature rows written straight to the store, bypassing analysis.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    update: FeatureUpdate,
}

impl FeatureBuilder {
    pub fn completed(submission_id: &str, tags: &[&str]) -> Self {
        let now = Utc::now();
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        Self {
            update: FeatureUpdate {
                submission_id: submission_id.to_string(),
                ocr_text: None,
                theme_tags_json: serde_json::to_string(&tags).ok(),
                analysis_status: AnalysisStatus::Completed,
                failure_reason: None,
                analyzed_at: now,
                extracted_at: Some(now),
            },
        }
    }

    pub fn with_status(submission_id: &str, status: AnalysisStatus) -> Self {
        let now = Utc::now();
        Self {
            update: FeatureUpdate {
                submission_id: submission_id.to_string(),
                ocr_text: None,
                theme_tags_json: None,
                analysis_status: status,
                failure_reason: None,
                analyzed_at: now,
                extracted_at: status.has_signals().then_some(now),
            },
        }
    }

    pub fn insights(mut self, insights: &ThemeInsights) -> Self {
        self.update.theme_tags_json = serde_json::to_string(insights).ok();
        self
    }

    pub fn ocr(mut self, text: &str) -> Self {
        self.update.ocr_text = Some(text.to_string());
        self
    }

    pub fn failure(mut self, reason: &str) -> Self {
        self.update.failure_reason = Some(reason.to_string());
        self
    }

    pub fn analyzed_at(mut self, at: DateTime<Utc>) -> Self {
        self.update.analyzed_at = at;
        self
    }

    pub fn build(self) -> FeatureUpdate {
        self.update
    }
}

/// A review with a unique id and a timestamp `minutes_ago` in the past.
pub fn review(
    id: &str,
    submission_id: &str,
    client_id: &str,
    decision: ReviewDecision,
    comment: Option<&str>,
    minutes_ago: i64,
) -> Review {
    Review {
        id: id.to_string(),
        submission_id: submission_id.to_string(),
        client_id: client_id.to_string(),
        decision,
        comment: comment.map(str::to_string),
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

/// Theme insights from per-category tag lists.
pub fn insights(subjects: &[&str], vibes: &[&str], colors: &[&str]) -> ThemeInsights {
    let set = |items: &[&str]| items.iter().map(|i| i.to_string()).collect();
    ThemeInsights {
        subjects: set(subjects),
        vibes: set(vibes),
        colors: set(colors),
        ..ThemeInsights::default()
    }
}
