//! # Audit Recorder
//!
//! Builds one immutable [`AuditEvent`] per lifecycle event. The recorder
//! owns the server clock used for audit timestamps: every timestamp it hands
//! out is strictly greater than the previous one, even when the wall clock
//! stalls or steps backwards.
//!
//! Recording does not persist anything. Events are added to the
//! [`UnitOfWork`](crate::state::UnitOfWork) of the triggering operation and
//! committed together with the state change.

use std::sync::Arc;

use parking_lot::Mutex;

use signsecure_core::{AuditEventRef, DocumentRef, Timestamp, UserId};
use signsecure_state::{AuditAction, AuditEvent};

use crate::extractors::RequestContext;

/// Who performed an audited action.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Platform user, absent for signer-session actions.
    pub user: Option<UserId>,
    /// Acting email address.
    pub email: String,
}

/// Issues audit events with non-decreasing timestamps.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    last: Arc<Mutex<Option<Timestamp>>>,
}

impl AuditRecorder {
    /// New recorder with no history.
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Seed the clock with the newest persisted timestamp.
    pub fn observe(&self, at: Timestamp) {
        let mut last = self.last.lock();
        if last.map_or(true, |l| at > l) {
            *last = Some(at);
        }
    }

    /// Next timestamp: wall-clock now, bumped past the previous issue.
    pub fn tick(&self) -> Timestamp {
        let mut last = self.last.lock();
        let now = Timestamp::now();
        let next = match *last {
            Some(prev) if now <= prev => prev.next_tick(),
            _ => now,
        };
        *last = Some(next);
        next
    }

    /// Build one event for `document`.
    pub fn record(
        &self,
        document: DocumentRef,
        action: AuditAction,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> AuditEvent {
        let event = AuditEvent {
            id: AuditEventRef::new(),
            document,
            user: actor.user,
            email: actor.email.clone(),
            action,
            timestamp: self.tick(),
            ip_address: ctx.ip_address.map(|ip| ip.to_string()),
            user_agent: ctx.user_agent.clone(),
        };
        tracing::debug!(
            document = %document.short(),
            action = %action,
            email = %event.email,
            "audit event recorded"
        );
        event
    }
}

impl Default for AuditRecorder {
    fn default() -> Self {
        Self::new()
    }
}
