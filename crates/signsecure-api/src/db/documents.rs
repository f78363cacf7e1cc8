//! Document persistence.
//!
//! The transition log is stored as JSONB next to the status column.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use signsecure_core::{DocumentRef, Timestamp, UserId};
use signsecure_state::{Document, DocumentStatus, DocumentTransitionRecord};

use super::{decode_err, expect_one};

/// Insert or update a document by reference.
pub async fn upsert(conn: &mut PgConnection, record: &Document) -> Result<(), sqlx::Error> {
    let transition_log = serde_json::to_value(&record.transitions).map_err(|e| {
        sqlx::Error::Protocol(format!("failed to serialize document transition_log: {e}"))
    })?;

    let result = sqlx::query(
        "INSERT INTO documents
            (ref, title, description, owner_ref, status, file, file_type,
             transition_log, created_at, modified_at, deleted_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (ref) DO UPDATE SET
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            status = EXCLUDED.status,
            file = EXCLUDED.file,
            file_type = EXCLUDED.file_type,
            transition_log = EXCLUDED.transition_log,
            modified_at = EXCLUDED.modified_at,
            deleted_at = EXCLUDED.deleted_at",
    )
    .bind(record.id.0)
    .bind(&record.title)
    .bind(&record.description)
    .bind(record.owner.0)
    .bind(record.status.as_str())
    .bind(&record.file)
    .bind(&record.file_type)
    .bind(&transition_log)
    .bind(record.created_at.into_datetime())
    .bind(record.modified_at.into_datetime())
    .bind(record.deleted_at.map(Timestamp::into_datetime))
    .execute(&mut *conn)
    .await?;

    expect_one(result.rows_affected(), "document upsert")
}

/// Load every document, deleted ones included.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Document>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT ref, title, description, owner_ref, status, file, file_type,
                transition_log, created_at, modified_at, deleted_at
         FROM documents ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DocumentRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    #[sqlx(rename = "ref")]
    reference: Uuid,
    title: String,
    description: String,
    owner_ref: Uuid,
    status: String,
    file: Option<String>,
    file_type: String,
    transition_log: serde_json::Value,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl DocumentRow {
    fn into_record(self) -> Result<Document, sqlx::Error> {
        let status: DocumentStatus = self
            .status
            .parse()
            .map_err(|e| decode_err("document status", e))?;
        let transitions: Vec<DocumentTransitionRecord> =
            serde_json::from_value(self.transition_log)
                .map_err(|e| decode_err("document transition_log", e))?;

        Ok(Document {
            id: DocumentRef::from_uuid(self.reference),
            title: self.title,
            description: self.description,
            owner: UserId::from_uuid(self.owner_ref),
            status,
            file: self.file,
            file_type: self.file_type,
            created_at: Timestamp::from_utc(self.created_at),
            modified_at: Timestamp::from_utc(self.modified_at),
            deleted_at: self.deleted_at.map(Timestamp::from_utc),
            transitions,
        })
    }
}
