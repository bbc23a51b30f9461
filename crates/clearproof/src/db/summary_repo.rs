//! Client summary cache rows.

use rusqlite::{params, OptionalExtension};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::SummaryEntry;

pub fn find(db: &Database, client_id: &str) -> Result<Option<SummaryEntry>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT client_id, payload_json, approved_count, rejected_count, updated_at
                 FROM client_summaries WHERE client_id = ?1",
                params![client_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, i64>(2)?,
                        r.get::<_, i64>(3)?,
                        r.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((client_id, payload_json, approved, rejected, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(SummaryEntry {
            client_id,
            payload_json,
            approved_count: approved.max(0) as u64,
            rejected_count: rejected.max(0) as u64,
            updated_at: parse_timestamp("client_summaries.updated_at", &updated_at)?,
        }))
    })
}

/// Replaces the cached summary of a client.
pub fn upsert(db: &Database, entry: &SummaryEntry) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO client_summaries
               (client_id, payload_json, approved_count, rejected_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(client_id) DO UPDATE SET
               payload_json = excluded.payload_json,
               approved_count = excluded.approved_count,
               rejected_count = excluded.rejected_count,
               updated_at = excluded.updated_at",
            params![
                entry.client_id,
                entry.payload_json,
                entry.approved_count as i64,
                entry.rejected_count as i64,
                format_timestamp(&entry.updated_at),
            ],
        )?;
        Ok(())
    })
}
