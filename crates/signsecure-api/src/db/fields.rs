//! Form field persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use signsecure_core::{DocumentRef, FieldRef, SignerRef, Timestamp};
use signsecure_state::{FieldGeometry, FieldType, FormField};

use super::{decode_err, expect_one};

pub async fn upsert(conn: &mut PgConnection, record: &FormField) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO form_fields
            (ref, document_id, signer_id, field_type, x, y, width, height, page,
             required, value, label, created_at, modified_at, deleted_at)
         SELECT $1, d.id, s.id, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
         FROM documents d JOIN signers s ON s.document_id = d.id AND s.ref = $3
         WHERE d.ref = $2
         ON CONFLICT (ref) DO UPDATE SET
            signer_id = EXCLUDED.signer_id,
            field_type = EXCLUDED.field_type,
            x = EXCLUDED.x,
            y = EXCLUDED.y,
            width = EXCLUDED.width,
            height = EXCLUDED.height,
            page = EXCLUDED.page,
            required = EXCLUDED.required,
            value = EXCLUDED.value,
            label = EXCLUDED.label,
            modified_at = EXCLUDED.modified_at,
            deleted_at = EXCLUDED.deleted_at",
    )
    .bind(record.id.0)
    .bind(record.document.0)
    .bind(record.signer.0)
    .bind(record.field_type.as_str())
    .bind(record.geometry.x)
    .bind(record.geometry.y)
    .bind(record.geometry.width)
    .bind(record.geometry.height)
    .bind(i64::from(record.geometry.page))
    .bind(record.required)
    .bind(&record.value)
    .bind(&record.label)
    .bind(record.created_at.into_datetime())
    .bind(record.modified_at.into_datetime())
    .bind(record.deleted_at.map(Timestamp::into_datetime))
    .execute(&mut *conn)
    .await?;

    expect_one(result.rows_affected(), "form field upsert")
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<FormField>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FieldRow>(
        "SELECT f.ref, d.ref AS document_ref, s.ref AS signer_ref, f.field_type,
                f.x, f.y, f.width, f.height, f.page, f.required, f.value, f.label,
                f.created_at, f.modified_at, f.deleted_at
         FROM form_fields f
         JOIN documents d ON d.id = f.document_id
         JOIN signers s ON s.id = f.signer_id
         ORDER BY f.id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(FieldRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct FieldRow {
    #[sqlx(rename = "ref")]
    reference: Uuid,
    document_ref: Uuid,
    signer_ref: Uuid,
    field_type: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    page: i64,
    required: bool,
    value: Option<String>,
    label: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl FieldRow {
    fn into_record(self) -> Result<FormField, sqlx::Error> {
        let field_type: FieldType = self
            .field_type
            .parse()
            .map_err(|e| decode_err("field type", e))?;
        let page = u32::try_from(self.page).map_err(|e| decode_err("field page", e))?;

        Ok(FormField {
            id: FieldRef::from_uuid(self.reference),
            document: DocumentRef::from_uuid(self.document_ref),
            signer: SignerRef::from_uuid(self.signer_ref),
            field_type,
            geometry: FieldGeometry {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                page,
            },
            required: self.required,
            value: self.value,
            label: self.label,
            created_at: Timestamp::from_utc(self.created_at),
            modified_at: Timestamp::from_utc(self.modified_at),
            deleted_at: self.deleted_at.map(Timestamp::from_utc),
        })
    }
}
