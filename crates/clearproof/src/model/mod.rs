//! Domain types shared by the analysis pipeline, the insights layer and
//! the database repositories.

pub mod feature;
pub mod review;
pub mod submission;
pub mod theme;

pub use feature::{AnalysisStatus, ContentFeature, FeatureUpdate, Readiness};
pub use review::{Review, ReviewCounts, ReviewDecision, SummaryEntry};
pub use submission::{MediaFile, MediaKind, Submission};
pub use theme::{normalize_tag, normalize_tags, ThemeInsights, ThemePayload, MAX_TAG_LEN};
