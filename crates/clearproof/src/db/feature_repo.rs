//! Content feature repository: one analysis row per submission.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_optional_timestamp, Database, DatabaseError};
use crate::model::{AnalysisStatus, ContentFeature, FeatureUpdate};

/// SQLite's default bound-parameter limit is 999; stay well below it.
const IN_CLAUSE_CHUNK: usize = 500;

struct FeatureRow {
    id: i64,
    submission_id: String,
    ocr_text: Option<String>,
    theme_tags_json: Option<String>,
    analysis_status: String,
    failure_reason: Option<String>,
    last_analyzed_at: Option<String>,
    extracted_at: Option<String>,
}

impl FeatureRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            submission_id: row.get("submission_id")?,
            ocr_text: row.get("ocr_text")?,
            theme_tags_json: row.get("theme_tags_json")?,
            analysis_status: row.get("analysis_status")?,
            failure_reason: row.get("failure_reason")?,
            last_analyzed_at: row.get("last_analyzed_at")?,
            extracted_at: row.get("extracted_at")?,
        })
    }

    fn into_feature(self) -> Result<ContentFeature, DatabaseError> {
        let analysis_status = self
            .analysis_status
            .parse::<AnalysisStatus>()
            .map_err(|_| DatabaseError::InvalidData {
                column: "content_features.analysis_status".to_string(),
                value: self.analysis_status.clone(),
            })?;

        Ok(ContentFeature {
            id: self.id,
            submission_id: self.submission_id,
            ocr_text: self.ocr_text,
            theme_tags_json: self.theme_tags_json,
            analysis_status,
            failure_reason: self.failure_reason,
            last_analyzed_at: parse_optional_timestamp(
                "content_features.last_analyzed_at",
                self.last_analyzed_at,
            )?,
            extracted_at: parse_optional_timestamp(
                "content_features.extracted_at",
                self.extracted_at,
            )?,
        })
    }
}

fn select_one(conn: &Connection, submission_id: &str) -> Result<Option<ContentFeature>, DatabaseError> {
    conn.query_row(
        "SELECT * FROM content_features WHERE submission_id = ?1",
        params![submission_id],
        FeatureRow::from_row,
    )
    .optional()?
    .map(FeatureRow::into_feature)
    .transpose()
}

/// Finds the feature row of a submission.
pub fn find_by_submission(
    db: &Database,
    submission_id: &str,
) -> Result<Option<ContentFeature>, DatabaseError> {
    db.with_conn(|conn| select_one(conn, submission_id))
}

/// Finds the feature rows of a set of submissions. Missing rows are skipped.
pub fn find_by_submissions(
    db: &Database,
    submission_ids: &[String],
) -> Result<Vec<ContentFeature>, DatabaseError> {
    db.with_conn(|conn| {
        let mut features = Vec::with_capacity(submission_ids.len());

        for chunk in submission_ids.chunks(IN_CLAUSE_CHUNK) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT * FROM content_features WHERE submission_id IN ({})",
                placeholders
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), FeatureRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            for row in rows {
                features.push(row.into_feature()?);
            }
        }

        Ok(features)
    })
}

/// Inserts or replaces the analysis values of a submission's feature row.
///
/// The row id is preserved across re-analysis.
pub fn upsert(db: &Database, update: &FeatureUpdate) -> Result<ContentFeature, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO content_features (submission_id, ocr_text, theme_tags_json,
             analysis_status, failure_reason, last_analyzed_at, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(submission_id) DO UPDATE SET
               ocr_text = excluded.ocr_text,
               theme_tags_json = excluded.theme_tags_json,
               analysis_status = excluded.analysis_status,
               failure_reason = excluded.failure_reason,
               last_analyzed_at = excluded.last_analyzed_at,
               extracted_at = excluded.extracted_at",
            params![
                update.submission_id,
                update.ocr_text,
                update.theme_tags_json,
                update.analysis_status.as_str(),
                update.failure_reason,
                format_timestamp(&update.analyzed_at),
                update.extracted_at.as_ref().map(format_timestamp),
            ],
        )?;

        select_one(conn, &update.submission_id)?.ok_or_else(|| DatabaseError::NotFound {
            entity: "content feature",
            id: update.submission_id.clone(),
        })
    })
}

/// Flags a submission for re-analysis, keeping previously extracted data.
pub fn mark_pending(
    db: &Database,
    submission_id: &str,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO content_features (submission_id, analysis_status, last_analyzed_at)
             VALUES (?1, 'pending', ?2)
             ON CONFLICT(submission_id) DO UPDATE SET
               analysis_status = 'pending',
               failure_reason = NULL,
               last_analyzed_at = excluded.last_analyzed_at",
            params![submission_id, format_timestamp(at)],
        )?;
        Ok(())
    })
}
