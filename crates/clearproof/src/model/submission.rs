use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad media category, used to decide what gets analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Other => "other",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }

    /// Classifies a file by its declared content type, falling back to the
    /// extension of its stored path.
    pub fn detect(content_type: Option<&str>, stored_path: &str) -> Self {
        let declared = content_type
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty() && c != "application/octet-stream");

        let mime = declared.or_else(|| {
            mime_guess::from_path(Path::new(stored_path))
                .first()
                .map(|m| m.essence_str().to_string())
        });

        match mime.as_deref().and_then(|m| m.split('/').next()) {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            Some("audio") => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub id: String,
    pub submission_id: String,
    /// Path relative to the storage root.
    pub stored_path: String,
    pub content_type: Option<String>,
    pub kind: MediaKind,
    pub caption: Option<String>,
}

impl MediaFile {
    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }
}

/// A batch of media a professional sent to a client for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub client_id: String,
    pub owner_user_id: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub media: Vec<MediaFile>,
}

impl Submission {
    pub fn images(&self) -> impl Iterator<Item = &MediaFile> {
        self.media.iter().filter(|m| m.is_image())
    }

    pub fn has_images(&self) -> bool {
        self.media.iter().any(MediaFile::is_image)
    }
}
