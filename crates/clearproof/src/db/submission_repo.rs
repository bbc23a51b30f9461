//! Submission repository: submissions and their media files.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{MediaFile, MediaKind, Submission};

/// Input for a new submission row.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub id: String,
    pub client_id: String,
    pub owner_user_id: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub media: Vec<NewMediaFile>,
}

/// Input for a new media file row. The media kind is derived on insert.
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub id: String,
    pub stored_path: String,
    pub content_type: Option<String>,
    pub caption: Option<String>,
}

struct SubmissionRow {
    id: String,
    client_id: String,
    owner_user_id: String,
    message: Option<String>,
    created_at: String,
}

impl SubmissionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            client_id: row.get("client_id")?,
            owner_user_id: row.get("owner_user_id")?,
            message: row.get("message")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_submission(self, media: Vec<MediaFile>) -> Result<Submission, DatabaseError> {
        Ok(Submission {
            created_at: parse_timestamp("submissions.created_at", &self.created_at)?,
            id: self.id,
            client_id: self.client_id,
            owner_user_id: self.owner_user_id,
            message: self.message,
            media,
        })
    }
}

fn media_from_row(row: &Row<'_>) -> Result<MediaFile, rusqlite::Error> {
    let kind: String = row.get("media_kind")?;
    Ok(MediaFile {
        id: row.get("id")?,
        submission_id: row.get("submission_id")?,
        stored_path: row.get("stored_path")?,
        content_type: row.get("content_type")?,
        kind: MediaKind::from_str_lossy(&kind),
        caption: row.get("caption")?,
    })
}

/// Inserts a submission together with its media files.
pub fn insert(db: &Database, submission: &NewSubmission) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO submissions (id, client_id, owner_user_id, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                submission.id,
                submission.client_id,
                submission.owner_user_id,
                submission.message,
                format_timestamp(&submission.created_at),
            ],
        )?;

        for (position, media) in submission.media.iter().enumerate() {
            let kind = MediaKind::detect(media.content_type.as_deref(), &media.stored_path);
            tx.execute(
                "INSERT INTO media_files (id, submission_id, stored_path, content_type,
                 media_kind, caption, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    media.id,
                    submission.id,
                    media.stored_path,
                    media.content_type,
                    kind.as_str(),
                    media.caption,
                    position as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    })
}

/// Finds a submission with its media files, regardless of owner.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Submission>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM submissions WHERE id = ?1",
                params![id],
                SubmissionRow::from_row,
            )
            .optional()?;
        load_with_media(conn, row)
    })
}

/// Finds a submission only if it belongs to `owner_user_id`.
pub fn find_for_owner(
    db: &Database,
    id: &str,
    owner_user_id: &str,
) -> Result<Option<Submission>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM submissions WHERE id = ?1 AND owner_user_id = ?2",
                params![id, owner_user_id],
                SubmissionRow::from_row,
            )
            .optional()?;
        load_with_media(conn, row)
    })
}

fn load_with_media(
    conn: &Connection,
    row: Option<SubmissionRow>,
) -> Result<Option<Submission>, DatabaseError> {
    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT * FROM media_files WHERE submission_id = ?1 ORDER BY position ASC, id ASC",
    )?;
    let media = stmt
        .query_map(params![row.id], media_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    row.into_submission(media).map(Some)
}

/// Submissions with at least one image whose analysis is missing, failed,
/// or stuck pending since before `stale_before` (or with no attempt time).
pub fn find_backfill_candidates(
    db: &Database,
    stale_before: &DateTime<Utc>,
) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT s.id FROM submissions s
             LEFT JOIN content_features f ON f.submission_id = s.id
             WHERE EXISTS (
                 SELECT 1 FROM media_files m
                 WHERE m.submission_id = s.id AND m.media_kind = 'image'
             )
             AND (
                 f.id IS NULL
                 OR f.analysis_status = 'failed'
                 OR (f.analysis_status = 'pending'
                     AND (f.last_analyzed_at IS NULL OR f.last_analyzed_at < ?1))
             )
             ORDER BY s.created_at ASC",
        )?;
        let ids = stmt
            .query_map(params![format_timestamp(stale_before)], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    })
}

/// Deletes a submission. Media, reviews and the content feature cascade.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute("DELETE FROM submissions WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    })
}
