//! # signsecure-core — Foundational Types for SignSecure
//!
//! The leaf crate of the workspace. Every other `signsecure-*` crate depends
//! on it; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Opaque references, never sequential keys.** `DocumentRef`, `SignerRef`,
//!    `FieldRef`, `AuditEventRef` and `UserId` are UUID newtypes. They are the
//!    only identifiers that appear in URLs, tokens and API bodies. Storage
//!    keys stay inside the persistence layer.
//!
//! 2. **Validated addresses.** `Email` can only be built through a checked
//!    constructor, so a signer can never be created with an address that the
//!    mail collaborator would reject outright.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with microsecond precision,
//!    the resolution Postgres `timestamptz` round-trips without loss.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `signsecure-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod email;
pub mod error;
pub mod identity;
pub mod temporal;

pub use email::Email;
pub use error::CoreError;
pub use identity::{AuditEventRef, DocumentRef, FieldRef, SignerRef, UserId};
pub use temporal::Timestamp;
