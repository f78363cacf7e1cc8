//! # Form Fields
//!
//! A field is a box placed on one page of a document and assigned to one
//! signer. Pages are zero-based. Geometry is in the page coordinate space of
//! the frontend viewer; only sanity is checked here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use signsecure_core::{DocumentRef, FieldRef, SignerRef, Timestamp};

/// Maximum label length.
pub const MAX_LABEL_LEN: usize = 255;

/// Kind of input a field collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Drawn or typed signature.
    Signature,
    /// Signing date.
    Date,
    /// Free text.
    Text,
}

impl FieldType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::Date => "date",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signature" => Ok(Self::Signature),
            "date" => Ok(Self::Date),
            "text" => Ok(Self::Text),
            other => Err(FieldError::UnknownType(other.to_string())),
        }
    }
}

/// Errors raised by field validation and fulfilment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Geometry failed validation.
    #[error("invalid field geometry: {0}")]
    InvalidGeometry(String),

    /// Label too long.
    #[error("label must not exceed {MAX_LABEL_LEN} characters")]
    LabelTooLong,

    /// Required field left empty.
    #[error("field {field} is required")]
    Required {
        /// Field left empty.
        field: FieldRef,
    },

    /// The field is assigned to a different signer.
    #[error("field {field} is not assigned to this signer")]
    NotAssigned {
        /// Field the value was submitted for.
        field: FieldRef,
    },

    /// Type string not recognised.
    #[error("unknown field type {0:?}")]
    UnknownType(String),
}

/// Position and size of a field on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldGeometry {
    /// Left offset.
    pub x: f64,
    /// Top offset.
    pub y: f64,
    /// Box width.
    pub width: f64,
    /// Box height.
    pub height: f64,
    /// Zero-based page index.
    pub page: u32,
}

impl FieldGeometry {
    /// Check that offsets are finite and non-negative and that the box has
    /// positive finite extent.
    pub fn validate(&self) -> Result<(), FieldError> {
        for (name, v) in [("x", self.x), ("y", self.y)] {
            if !v.is_finite() || v < 0.0 {
                return Err(FieldError::InvalidGeometry(format!(
                    "{name} must be a finite value >= 0, got {v}"
                )));
            }
        }
        for (name, v) in [("width", self.width), ("height", self.height)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(FieldError::InvalidGeometry(format!(
                    "{name} must be a finite value > 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Layout attributes supplied when a field is created or edited.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    /// Assigned signer.
    pub signer: SignerRef,
    /// Input kind.
    pub field_type: FieldType,
    /// Placement.
    pub geometry: FieldGeometry,
    /// Whether a value is mandatory at signing.
    pub required: bool,
    /// Caption shown to the signer.
    pub label: String,
}

/// A field assigned to one signer on one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// External reference.
    pub id: FieldRef,
    /// Owning document.
    pub document: DocumentRef,
    /// Assigned signer.
    pub signer: SignerRef,
    /// Input kind.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Placement.
    #[serde(flatten)]
    pub geometry: FieldGeometry,
    /// Whether a value is mandatory at signing.
    pub required: bool,
    /// Submitted value.
    pub value: Option<String>,
    /// Caption.
    pub label: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub modified_at: Timestamp,
    /// Soft-delete marker.
    pub deleted_at: Option<Timestamp>,
}

impl FormField {
    /// Create a field on `document`.
    pub fn new(
        document: DocumentRef,
        layout: FieldLayout,
        now: Timestamp,
    ) -> Result<Self, FieldError> {
        validate_layout(&layout)?;
        Ok(Self {
            id: FieldRef::new(),
            document,
            signer: layout.signer,
            field_type: layout.field_type,
            geometry: layout.geometry,
            required: layout.required,
            value: None,
            label: layout.label,
            created_at: now,
            modified_at: now,
            deleted_at: None,
        })
    }

    /// Replace the layout attributes.
    pub fn relayout(&mut self, layout: FieldLayout, now: Timestamp) -> Result<(), FieldError> {
        validate_layout(&layout)?;
        self.signer = layout.signer;
        self.field_type = layout.field_type;
        self.geometry = layout.geometry;
        self.required = layout.required;
        self.label = layout.label;
        self.modified_at = now;
        Ok(())
    }

    /// Record a value submitted by `signer`.
    pub fn fill(
        &mut self,
        signer: SignerRef,
        value: &str,
        now: Timestamp,
    ) -> Result<(), FieldError> {
        if self.signer != signer {
            return Err(FieldError::NotAssigned { field: self.id });
        }
        self.value = Some(value.to_string());
        self.modified_at = now;
        Ok(())
    }

    /// Whether the field is required and has no non-blank value.
    pub fn is_unfulfilled(&self) -> bool {
        self.required
            && self
                .value
                .as_deref()
                .map_or(true, |v| v.trim().is_empty())
    }

    /// Soft-delete. The first deletion time is kept.
    pub fn soft_delete(&mut self, now: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.modified_at = now;
        }
    }

    /// Whether the field is live.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

fn validate_layout(layout: &FieldLayout) -> Result<(), FieldError> {
    layout.geometry.validate()?;
    if layout.label.chars().count() > MAX_LABEL_LEN {
        return Err(FieldError::LabelTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: i64) -> Timestamp {
        Timestamp::from_epoch_secs(1_700_000_000 + n).unwrap()
    }

    fn geometry() -> FieldGeometry {
        FieldGeometry {
            x: 72.0,
            y: 640.5,
            width: 180.0,
            height: 40.0,
            page: 0,
        }
    }

    fn layout(signer: SignerRef) -> FieldLayout {
        FieldLayout {
            signer,
            field_type: FieldType::Signature,
            geometry: geometry(),
            required: true,
            label: "Tenant signature".into(),
        }
    }

    #[test]
    fn first_page_is_zero() {
        let f = FormField::new(DocumentRef::new(), layout(SignerRef::new()), t(0)).unwrap();
        assert_eq!(f.geometry.page, 0);
    }

    #[test]
    fn rejects_degenerate_boxes() {
        for g in [
            FieldGeometry { width: 0.0, ..geometry() },
            FieldGeometry { height: -3.0, ..geometry() },
            FieldGeometry { x: -1.0, ..geometry() },
            FieldGeometry { y: f64::NAN, ..geometry() },
            FieldGeometry { width: f64::INFINITY, ..geometry() },
        ] {
            assert!(g.validate().is_err(), "accepted {g:?}");
        }
    }

    #[test]
    fn required_field_unfulfilled_until_filled() {
        let signer = SignerRef::new();
        let mut f = FormField::new(DocumentRef::new(), layout(signer), t(0)).unwrap();
        assert!(f.is_unfulfilled());
        f.fill(signer, "   ", t(1)).unwrap();
        assert!(f.is_unfulfilled());
        f.fill(signer, "A. Tenant", t(2)).unwrap();
        assert!(!f.is_unfulfilled());
    }

    #[test]
    fn optional_field_never_unfulfilled() {
        let mut l = layout(SignerRef::new());
        l.required = false;
        let f = FormField::new(DocumentRef::new(), l, t(0)).unwrap();
        assert!(!f.is_unfulfilled());
    }

    #[test]
    fn other_signer_cannot_fill() {
        let mut f = FormField::new(DocumentRef::new(), layout(SignerRef::new()), t(0)).unwrap();
        let err = f.fill(SignerRef::new(), "x", t(1)).unwrap_err();
        assert!(matches!(err, FieldError::NotAssigned { .. }));
        assert_eq!(f.value, None);
    }

    #[test]
    fn serializes_type_and_flat_geometry() {
        let f = FormField::new(DocumentRef::new(), layout(SignerRef::new()), t(0)).unwrap();
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["type"], "signature");
        assert_eq!(v["page"], 0);
        assert_eq!(v["x"], 72.0);
    }
}
