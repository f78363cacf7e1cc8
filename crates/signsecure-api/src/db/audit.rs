//! Audit event persistence. Events are insert-only.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use signsecure_core::{AuditEventRef, DocumentRef, Timestamp, UserId};
use signsecure_state::{AuditAction, AuditEvent};

use super::{decode_err, expect_one};

pub async fn insert(conn: &mut PgConnection, event: &AuditEvent) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO audit_events
            (ref, document_id, user_ref, email, action, occurred_at, ip_address, user_agent)
         SELECT $1, d.id, $3, $4, $5, $6, $7, $8
         FROM documents d WHERE d.ref = $2",
    )
    .bind(event.id.0)
    .bind(event.document.0)
    .bind(event.user.map(|u| u.0))
    .bind(&event.email)
    .bind(event.action.as_str())
    .bind(event.timestamp.into_datetime())
    .bind(&event.ip_address)
    .bind(&event.user_agent)
    .execute(&mut *conn)
    .await?;

    expect_one(result.rows_affected(), "audit event insert")
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT e.ref, d.ref AS document_ref, e.user_ref, e.email, e.action,
                e.occurred_at, e.ip_address, e.user_agent
         FROM audit_events e JOIN documents d ON d.id = e.document_id
         ORDER BY e.occurred_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AuditRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    #[sqlx(rename = "ref")]
    reference: Uuid,
    document_ref: Uuid,
    user_ref: Option<Uuid>,
    email: String,
    action: String,
    occurred_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: String,
}

impl AuditRow {
    fn into_record(self) -> Result<AuditEvent, sqlx::Error> {
        let action = AuditAction::parse(&self.action)
            .ok_or_else(|| decode_err("audit action", &self.action))?;

        Ok(AuditEvent {
            id: AuditEventRef::from_uuid(self.reference),
            document: DocumentRef::from_uuid(self.document_ref),
            user: self.user_ref.map(UserId::from_uuid),
            email: self.email,
            action,
            timestamp: Timestamp::from_utc(self.occurred_at),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        })
    }
}
