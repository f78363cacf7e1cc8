//! # Signing Algorithm
//!
//! One signer signs one document:
//!
//! 1. The document must be live and `sent`.
//! 2. The signer transitions `pending → signed` (rejected when already signed).
//! 3. Submitted values are written to that signer's fields. Under
//!    [`RequiredFields::Enforce`] every required field of the signer must end
//!    up non-blank.
//! 4. The signer set is re-evaluated *including the just-updated signer*. If
//!    no signer remains pending the document transitions to `completed`.
//!
//! [`sign`] is pure: it reads the current aggregate and returns the new
//! records, or an error with nothing changed. The caller commits the outcome
//! (and the `document_signed` / `document_completed` audit events) as one
//! unit while holding the document's lock, which is what makes completion
//! happen exactly once when signers race.

use std::collections::HashMap;

use thiserror::Error;

use signsecure_core::{FieldRef, SignerRef, Timestamp};

use crate::document::{Document, DocumentError, DocumentStatus};
use crate::field::{FieldError, FormField};
use crate::signer::{Signer, SignerError};

/// Errors raised by the signing algorithm.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// Signing is only possible while the document is `sent`.
    #[error("document is {status}; signing requires a sent document")]
    DocumentNotSent {
        /// Current status.
        status: DocumentStatus,
    },

    /// The signer does not belong to the document.
    #[error("signer {0} does not belong to this document")]
    SignerNotOnDocument(SignerRef),

    /// A submitted value names a field that does not exist on the document.
    #[error("field {0} does not exist on this document")]
    UnknownField(FieldRef),

    /// Document transition rejected.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Signer transition rejected.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// Field fulfilment rejected.
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Whether required fields must be filled for the sign to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredFields {
    /// Reject the sign while any required field of the signer is blank.
    Enforce,
    /// Accept the sign regardless of field values.
    Ignore,
}

/// Records produced by a successful sign.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    /// The document, completed if this sign was the last one.
    pub document: Document,
    /// The signer, now signed.
    pub signer: Signer,
    /// Fields whose value changed.
    pub fields: Vec<FormField>,
    /// Whether this sign completed the document.
    pub completed: bool,
}

/// Sign `signer_id` on `document`.
///
/// `signers` and `fields` are the document's current records. Deleted
/// records are ignored.
pub fn sign(
    document: &Document,
    signers: &[Signer],
    fields: &[FormField],
    signer_id: SignerRef,
    values: &HashMap<FieldRef, String>,
    required: RequiredFields,
    now: Timestamp,
) -> Result<SignOutcome, LifecycleError> {
    if document.is_deleted() {
        return Err(DocumentError::Deleted.into());
    }
    if document.status != DocumentStatus::Sent {
        return Err(LifecycleError::DocumentNotSent {
            status: document.status,
        });
    }

    let current = signers
        .iter()
        .find(|s| s.id == signer_id && s.document == document.id && s.deleted_at.is_none())
        .ok_or(LifecycleError::SignerNotOnDocument(signer_id))?;

    let mut signer = current.clone();
    signer.sign(now)?;

    let mut changed = Vec::with_capacity(values.len());
    for (field_id, value) in values {
        let field = fields
            .iter()
            .find(|f| f.id == *field_id && f.document == document.id && f.is_live())
            .ok_or(LifecycleError::UnknownField(*field_id))?;
        let mut field = field.clone();
        field.fill(signer_id, value, now)?;
        changed.push(field);
    }

    for field in fields.iter().filter(|f| {
        required == RequiredFields::Enforce
            && f.signer == signer_id
            && f.document == document.id
            && f.is_live()
    }) {
        let effective = changed.iter().find(|c| c.id == field.id).unwrap_or(field);
        if effective.is_unfulfilled() {
            return Err(FieldError::Required { field: field.id }.into());
        }
    }

    // Re-evaluate with the updated signer in place of the stored one.
    let still_pending = signers
        .iter()
        .filter(|s| {
            s.document == document.id && s.id != signer_id && s.deleted_at.is_none()
        })
        .chain(std::iter::once(&signer))
        .any(Signer::is_pending);

    let mut document = document.clone();
    let completed = !still_pending;
    if completed {
        document.complete(now)?;
    }

    Ok(SignOutcome {
        document,
        signer,
        fields: changed,
        completed,
    })
}

/// Number of live signers on `document`.
pub fn live_signer_count(document: &Document, signers: &[Signer]) -> usize {
    signers
        .iter()
        .filter(|s| s.document == document.id && s.deleted_at.is_none())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldGeometry, FieldLayout, FieldType};
    use crate::signer::{SignerDetails, SignerStatus};
    use proptest::prelude::*;
    use signsecure_core::{Email, UserId};

    fn t(n: i64) -> Timestamp {
        Timestamp::from_epoch_secs(1_700_000_000 + n).unwrap()
    }

    fn signer_on(doc: &Document, name: &str, order: u32) -> Signer {
        Signer::new(
            doc.id,
            SignerDetails {
                email: Email::parse(&format!("{name}@example.com")).unwrap(),
                name: name.to_string(),
                role: String::new(),
                order,
            },
            t(0),
        )
        .unwrap()
    }

    fn sent_with(n: usize) -> (Document, Vec<Signer>) {
        let mut doc = Document::new(UserId::new(), "Contract", "", t(0)).unwrap();
        let signers: Vec<_> = (0..n)
            .map(|i| signer_on(&doc, &format!("s{i}"), i as u32))
            .collect();
        doc.send(signers.len(), t(1)).unwrap();
        (doc, signers)
    }

    fn apply(
        doc: &mut Document,
        signers: &mut [Signer],
        fields: &mut [FormField],
        outcome: SignOutcome,
    ) {
        *doc = outcome.document;
        for s in signers.iter_mut() {
            if s.id == outcome.signer.id {
                *s = outcome.signer.clone();
            }
        }
        for f in outcome.fields {
            if let Some(slot) = fields.iter_mut().find(|x| x.id == f.id) {
                *slot = f;
            }
        }
    }

    #[test]
    fn two_signers_complete_on_second() {
        let (mut doc, mut signers) = sent_with(2);
        let mut fields: Vec<FormField> = Vec::new();
        let none = HashMap::new();

        let first = sign(
            &doc,
            &signers,
            &fields,
            signers[0].id,
            &none,
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap();
        assert!(!first.completed);
        assert_eq!(first.document.status, DocumentStatus::Sent);
        apply(&mut doc, &mut signers, &mut fields, first);

        let second = sign(
            &doc,
            &signers,
            &fields,
            signers[1].id,
            &none,
            RequiredFields::Enforce,
            t(3),
        )
        .unwrap();
        assert!(second.completed);
        assert_eq!(second.document.status, DocumentStatus::Completed);
    }

    #[test]
    fn single_signer_completes_immediately() {
        let (doc, signers) = sent_with(1);
        let out = sign(
            &doc,
            &signers,
            &[],
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap();
        assert!(out.completed);
        assert_eq!(out.signer.status, SignerStatus::Signed);
    }

    #[test]
    fn signing_twice_rejected() {
        let (mut doc, mut signers) = sent_with(2);
        let mut fields: Vec<FormField> = Vec::new();
        let out = sign(
            &doc,
            &signers,
            &fields,
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap();
        apply(&mut doc, &mut signers, &mut fields, out);

        let err = sign(
            &doc,
            &signers,
            &fields,
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(3),
        )
        .unwrap_err();
        assert_eq!(err, LifecycleError::Signer(SignerError::AlreadySigned));
        assert_eq!(signers[0].signed_at, Some(t(2)));
    }

    #[test]
    fn draft_document_cannot_be_signed() {
        let doc = Document::new(UserId::new(), "Contract", "", t(0)).unwrap();
        let signers = vec![signer_on(&doc, "a", 0)];
        let err = sign(
            &doc,
            &signers,
            &[],
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(1),
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::DocumentNotSent { .. }));
    }

    #[test]
    fn foreign_signer_rejected() {
        let (doc, signers) = sent_with(1);
        let (_, other) = sent_with(1);
        let err = sign(
            &doc,
            &signers,
            &[],
            other[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap_err();
        assert_eq!(err, LifecycleError::SignerNotOnDocument(other[0].id));
    }

    #[test]
    fn required_fields_must_be_filled() {
        let (doc, signers) = sent_with(1);
        let field = FormField::new(
            doc.id,
            FieldLayout {
                signer: signers[0].id,
                field_type: FieldType::Signature,
                geometry: FieldGeometry {
                    x: 10.0,
                    y: 10.0,
                    width: 100.0,
                    height: 30.0,
                    page: 0,
                },
                required: true,
                label: String::new(),
            },
            t(0),
        )
        .unwrap();
        let fields = vec![field.clone()];

        let err = sign(
            &doc,
            &signers,
            &fields,
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap_err();
        assert_eq!(err, LifecycleError::Field(FieldError::Required { field: field.id }));

        let values = HashMap::from([(field.id, "Signed by s0".to_string())]);
        let out = sign(
            &doc,
            &signers,
            &fields,
            signers[0].id,
            &values,
            RequiredFields::Enforce,
            t(3),
        )
        .unwrap();
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields[0].value.as_deref(), Some("Signed by s0"));
        assert!(out.completed);
    }

    #[test]
    fn owner_side_sign_ignores_blank_required_fields() {
        let (doc, signers) = sent_with(1);
        let field = FormField::new(
            doc.id,
            FieldLayout {
                signer: signers[0].id,
                field_type: FieldType::Date,
                geometry: FieldGeometry {
                    x: 5.0,
                    y: 5.0,
                    width: 80.0,
                    height: 20.0,
                    page: 2,
                },
                required: true,
                label: "Date".into(),
            },
            t(0),
        )
        .unwrap();
        let out = sign(
            &doc,
            &signers,
            &[field],
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Ignore,
            t(2),
        )
        .unwrap();
        assert!(out.completed);
        assert!(out.fields.is_empty());
    }

    #[test]
    fn values_for_other_signers_fields_rejected() {
        let (doc, signers) = sent_with(2);
        let field = FormField::new(
            doc.id,
            FieldLayout {
                signer: signers[1].id,
                field_type: FieldType::Text,
                geometry: FieldGeometry {
                    x: 0.0,
                    y: 0.0,
                    width: 50.0,
                    height: 20.0,
                    page: 1,
                },
                required: false,
                label: String::new(),
            },
            t(0),
        )
        .unwrap();
        let values = HashMap::from([(field.id, "forged".to_string())]);
        let err = sign(
            &doc,
            &signers,
            &[field],
            signers[0].id,
            &values,
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Field(FieldError::NotAssigned { .. })));
    }

    #[test]
    fn deleted_signers_do_not_block_completion() {
        let (mut doc, mut signers) = sent_with(2);
        signers[1].soft_delete(t(1));
        let out = sign(
            &doc,
            &signers,
            &[],
            signers[0].id,
            &HashMap::new(),
            RequiredFields::Enforce,
            t(2),
        )
        .unwrap();
        assert!(out.completed);
        apply(&mut doc, &mut signers, &mut [], out);
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    proptest! {
        #[test]
        fn any_order_completes_exactly_once(n in 1usize..8, seed in any::<u64>()) {
            let (mut doc, mut signers) = sent_with(n);
            let mut fields: Vec<FormField> = Vec::new();

            let mut order: Vec<usize> = (0..n).collect();
            let mut s = seed;
            for i in (1..n).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                order.swap(i, (s >> 33) as usize % (i + 1));
            }

            let mut completions = 0;
            let mut last_rank = doc.status.rank();
            for (step, idx) in order.into_iter().enumerate() {
                let id = signers[idx].id;
                let out = sign(
                    &doc,
                    &signers,
                    &fields,
                    id,
                    &HashMap::new(),
                    RequiredFields::Enforce,
                    t(10 + step as i64),
                )
                .unwrap();
                if out.completed {
                    completions += 1;
                    prop_assert_eq!(step, n - 1);
                }
                apply(&mut doc, &mut signers, &mut fields, out);
                prop_assert!(doc.status.rank() >= last_rank);
                last_rank = doc.status.rank();
            }
            prop_assert_eq!(completions, 1);
            prop_assert_eq!(doc.status, DocumentStatus::Completed);
            prop_assert!(signers.iter().all(Signer::is_signed));
        }

        #[test]
        fn resigning_never_changes_state(n in 1usize..5) {
            let (mut doc, mut signers) = sent_with(n);
            let mut fields: Vec<FormField> = Vec::new();
            let id = signers[0].id;
            let out = sign(
                &doc,
                &signers,
                &fields,
                id,
                &HashMap::new(),
                RequiredFields::Enforce,
                t(5),
            )
            .unwrap();
            apply(&mut doc, &mut signers, &mut fields, out);

            let before = (doc.clone(), signers.clone());
            prop_assert!(sign(
                &doc,
                &signers,
                &fields,
                id,
                &HashMap::new(),
                RequiredFields::Enforce,
                t(6),
            ).is_err());
            prop_assert_eq!(before, (doc, signers));
        }
    }
}
