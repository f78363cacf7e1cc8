//! # signsecure-state — Lifecycle State Machines
//!
//! The records of a signing workflow and the transitions between their
//! states. Everything here is synchronous and storage-agnostic: operations
//! take the current time explicitly and either mutate a record or return an
//! error with the record untouched.
//!
//! ## State Machines
//!
//! - **Document** (`document.rs`): `Draft → Sent → Completed`, forward only.
//!   Completion is derived, never requested.
//!
//! - **Signer** (`signer.rs`): `Pending → Signed`, terminal. `signed_at` is
//!   set exactly once.
//!
//! - **Form fields** (`field.rs`): placement validation and value fulfilment.
//!
//! - **Signing** (`signing.rs`): the sign algorithm joining the three, with
//!   the completion check evaluated over the updated signer set.
//!
//! - **Audit events** (`audit.rs`): the immutable event record and its
//!   closed action set.

pub mod audit;
pub mod document;
pub mod field;
pub mod signer;
pub mod signing;

pub use audit::{AuditAction, AuditEvent};
pub use document::{Document, DocumentError, DocumentStatus, DocumentTransitionRecord};
pub use field::{FieldError, FieldGeometry, FieldLayout, FieldType, FormField};
pub use signer::{Signer, SignerDetails, SignerError, SignerStatus};
pub use signing::{LifecycleError, RequiredFields, SignOutcome};
