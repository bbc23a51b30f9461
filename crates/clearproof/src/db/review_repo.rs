//! Review repository: client approve/reject decisions.

use rusqlite::{params, Connection, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{Review, ReviewCounts, ReviewDecision};

struct ReviewRow {
    id: String,
    submission_id: String,
    client_id: String,
    decision: String,
    comment: Option<String>,
    created_at: String,
}

impl ReviewRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            submission_id: row.get("submission_id")?,
            client_id: row.get("client_id")?,
            decision: row.get("decision")?,
            comment: row.get("comment")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_review(self) -> Result<Review, DatabaseError> {
        let decision =
            ReviewDecision::parse(&self.decision).ok_or_else(|| DatabaseError::InvalidData {
                column: "reviews.decision".to_string(),
                value: self.decision.clone(),
            })?;

        Ok(Review {
            created_at: parse_timestamp("reviews.created_at", &self.created_at)?,
            id: self.id,
            submission_id: self.submission_id,
            client_id: self.client_id,
            decision,
            comment: self.comment,
        })
    }
}

/// Records a review.
pub fn insert(db: &Database, review: &Review) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO reviews (id, submission_id, client_id, decision, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                review.id,
                review.submission_id,
                review.client_id,
                review.decision.as_str(),
                review.comment,
                format_timestamp(&review.created_at),
            ],
        )?;
        Ok(())
    })
}

/// All reviews of a client, oldest first.
pub fn find_by_client(db: &Database, client_id: &str) -> Result<Vec<Review>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM reviews WHERE client_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![client_id], ReviewRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ReviewRow::into_review).collect()
    })
}

fn count_where(conn: &Connection, filter: &str, args: &[&str]) -> Result<ReviewCounts, DatabaseError> {
    let sql = format!(
        "SELECT
            COALESCE(SUM(CASE WHEN decision = 'approved' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN decision = 'rejected' THEN 1 ELSE 0 END), 0)
         FROM reviews {}",
        filter
    );
    let (approved, rejected): (i64, i64) = conn.query_row(
        &sql,
        rusqlite::params_from_iter(args.iter()),
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(ReviewCounts::new(approved.max(0) as u64, rejected.max(0) as u64))
}

/// Approved/rejected counts for one client.
pub fn counts_for_client(db: &Database, client_id: &str) -> Result<ReviewCounts, DatabaseError> {
    db.with_conn(|conn| count_where(conn, "WHERE client_id = ?1", &[client_id]))
}

/// Approved/rejected counts across all clients.
pub fn global_counts(db: &Database) -> Result<ReviewCounts, DatabaseError> {
    db.with_conn(|conn| count_where(conn, "", &[]))
}
