//! Signer persistence. The parent document is resolved by reference inside
//! the statement.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use signsecure_core::{DocumentRef, Email, SignerRef, Timestamp};
use signsecure_state::{Signer, SignerStatus};

use super::{decode_err, expect_one};

pub async fn upsert(conn: &mut PgConnection, record: &Signer) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO signers
            (ref, document_id, email, name, role, sort_order, status,
             signed_at, viewed_at, token, created_at, modified_at, deleted_at)
         SELECT $1, d.id, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
         FROM documents d WHERE d.ref = $2
         ON CONFLICT (ref) DO UPDATE SET
            email = EXCLUDED.email,
            name = EXCLUDED.name,
            role = EXCLUDED.role,
            sort_order = EXCLUDED.sort_order,
            status = EXCLUDED.status,
            signed_at = EXCLUDED.signed_at,
            viewed_at = EXCLUDED.viewed_at,
            token = EXCLUDED.token,
            modified_at = EXCLUDED.modified_at,
            deleted_at = EXCLUDED.deleted_at",
    )
    .bind(record.id.0)
    .bind(record.document.0)
    .bind(record.email.as_str())
    .bind(&record.name)
    .bind(&record.role)
    .bind(i64::from(record.order))
    .bind(record.status.as_str())
    .bind(record.signed_at.map(Timestamp::into_datetime))
    .bind(record.viewed_at.map(Timestamp::into_datetime))
    .bind(&record.token)
    .bind(record.created_at.into_datetime())
    .bind(record.modified_at.into_datetime())
    .bind(record.deleted_at.map(Timestamp::into_datetime))
    .execute(&mut *conn)
    .await?;

    expect_one(result.rows_affected(), "signer upsert")
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<Signer>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SignerRow>(
        "SELECT s.ref, d.ref AS document_ref, s.email, s.name, s.role, s.sort_order,
                s.status, s.signed_at, s.viewed_at, s.token,
                s.created_at, s.modified_at, s.deleted_at
         FROM signers s JOIN documents d ON d.id = s.document_id
         ORDER BY s.id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(SignerRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct SignerRow {
    #[sqlx(rename = "ref")]
    reference: Uuid,
    document_ref: Uuid,
    email: String,
    name: String,
    role: String,
    sort_order: i64,
    status: String,
    signed_at: Option<DateTime<Utc>>,
    viewed_at: Option<DateTime<Utc>>,
    token: Option<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl SignerRow {
    fn into_record(self) -> Result<Signer, sqlx::Error> {
        let status: SignerStatus = self
            .status
            .parse()
            .map_err(|e| decode_err("signer status", e))?;
        let email = Email::parse(&self.email).map_err(|e| decode_err("signer email", e))?;
        let order = u32::try_from(self.sort_order).map_err(|e| decode_err("signer order", e))?;

        Ok(Signer {
            id: SignerRef::from_uuid(self.reference),
            document: DocumentRef::from_uuid(self.document_ref),
            email,
            name: self.name,
            role: self.role,
            order,
            status,
            signed_at: self.signed_at.map(Timestamp::from_utc),
            viewed_at: self.viewed_at.map(Timestamp::from_utc),
            token: self.token,
            created_at: Timestamp::from_utc(self.created_at),
            modified_at: Timestamp::from_utc(self.modified_at),
            deleted_at: self.deleted_at.map(Timestamp::from_utc),
        })
    }
}
