//! # Application State
//!
//! Shared state for the Axum application: the in-memory stores that serve
//! every read, the collaborators lifecycle operations call into, and the
//! optional Postgres pool that writes are committed through.
//!
//! ## Writes
//!
//! A lifecycle operation never mutates a store directly. It computes new
//! records on clones, collects them with their audit events in a
//! [`UnitOfWork`], and calls [`AppState::commit`]. The commit persists the
//! whole unit in one database transaction first (when a pool is configured)
//! and only then applies it to the stores, so a failed write leaves both
//! copies untouched.
//!
//! All writes touching one document run under that document's entry in
//! [`DocumentLocks`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sqlx::PgPool;
use uuid::Uuid;

use signsecure_core::{DocumentRef, Timestamp};
use signsecure_crypto::{SignerTokenIssuer, TokenConfig, TokenSecret};
use signsecure_state::{AuditEvent, Document, FormField, Signer};

use crate::audit::AuditRecorder;
use crate::config::{AppConfig, ConfigError};
use crate::error::AppError;
use crate::notify::{LogMailer, Mailer, NotificationDispatcher, NotifyConfig};
use crate::policy::AccessPolicy;

// -- Generic Store -------------------------------------------------------------

/// Thread-safe in-memory store keyed by reference UUID.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by reference.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// All records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a read lock can be taken within `timeout`.
    pub fn is_readable_within(&self, timeout: std::time::Duration) -> bool {
        self.data.try_read_for(timeout).is_some()
    }
    #[cfg(test)]
    pub(crate) fn hold_write(&self) -> parking_lot::RwLockWriteGuard<'_, HashMap<Uuid, T>> {
        self.data.write()
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Per-document locks --------------------------------------------------------

type LockMap = HashMap<DocumentRef, Arc<tokio::sync::Mutex<()>>>;

/// One async mutex per document.
///
/// An entry lives only while some task holds or waits for it. The last
/// [`DocumentGuard`] to release removes it from the map.
#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl DocumentLocks {
    /// Wait for exclusive access to `document`'s aggregate.
    pub async fn acquire(&self, document: DocumentRef) -> DocumentGuard {
        let lock = Arc::clone(self.inner.lock().entry(document).or_default());
        let guard = lock.lock_owned().await;
        DocumentGuard {
            guard: Some(guard),
            document,
            locks: Arc::clone(&self.inner),
        }
    }

    /// Number of documents with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no document lock is held or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one document. Releases on drop.
#[derive(Debug)]
pub struct DocumentGuard {
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
    document: DocumentRef,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only taken under the map lock, so a count of one here
        // means no other task holds or awaits this entry.
        let mut map = self.locks.lock();
        if map
            .get(&self.document)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.document);
        }
    }
}

// -- Unit of Work ---------------------------------------------------------------

/// Records produced by one lifecycle operation, committed all-or-nothing.
#[derive(Debug, Default, Clone)]
pub struct UnitOfWork {
    pub documents: Vec<Document>,
    pub signers: Vec<Signer>,
    pub fields: Vec<FormField>,
    pub events: Vec<AuditEvent>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents whose aggregate this unit touches, deduplicated.
    pub fn touched_documents(&self) -> Vec<DocumentRef> {
        let mut refs: Vec<DocumentRef> = self
            .documents
            .iter()
            .map(|d| d.id)
            .chain(self.signers.iter().map(|s| s.document))
            .chain(self.fields.iter().map(|f| f.document))
            .chain(self.events.iter().map(|e| e.document))
            .collect();
        refs.sort();
        refs.dedup();
        refs
    }

    /// Whether there is nothing to commit.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.signers.is_empty()
            && self.fields.is_empty()
            && self.events.is_empty()
    }
}

// -- Application State ----------------------------------------------------------

/// Shared application state passed to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub documents: Store<Document>,
    pub signers: Store<Signer>,
    pub fields: Store<FormField>,
    pub audit_events: Store<AuditEvent>,
    pub locks: DocumentLocks,
    pub tokens: Arc<SignerTokenIssuer>,
    pub dispatcher: NotificationDispatcher,
    pub recorder: AuditRecorder,
    pub policy: AccessPolicy,
    pub config: AppConfig,
    /// Postgres pool. `None` runs in-memory only.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Default configuration, logging mailer, no database, ephemeral token key.
    pub fn new() -> Self {
        Self::assemble(
            AppConfig::default(),
            Arc::new(LogMailer),
            None,
            TokenSecret::generate(),
        )
    }

    /// Build state from configuration.
    ///
    /// Without a configured token secret an ephemeral one is generated;
    /// links issued by this process stop working after a restart.
    pub fn with_config(
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        db_pool: Option<PgPool>,
    ) -> Result<Self, ConfigError> {
        let secret = match &config.token_secret {
            Some(s) => TokenSecret::new(s.expose().as_bytes()).map_err(|e| {
                ConfigError::Invalid {
                    key: "token_secret",
                    reason: e.to_string(),
                }
            })?,
            None => {
                tracing::warn!(
                    "SIGNSECURE_TOKEN_SECRET not set, using an ephemeral key. \
                     Signing links will not survive a restart."
                );
                TokenSecret::generate()
            }
        };
        Ok(Self::assemble(config, mailer, db_pool, secret))
    }

    fn assemble(
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        db_pool: Option<PgPool>,
        secret: TokenSecret,
    ) -> Self {
        let tokens = SignerTokenIssuer::new(TokenConfig {
            secret,
            validity_days: config.token_ttl_days,
        });
        let dispatcher = NotificationDispatcher::new(
            NotifyConfig {
                frontend_url: config.frontend_url.clone(),
                from_email: config.from_email.clone(),
                expiry_days: tokens.validity_days(),
            },
            mailer,
        );
        Self {
            documents: Store::new(),
            signers: Store::new(),
            fields: Store::new(),
            audit_events: Store::new(),
            locks: DocumentLocks::default(),
            tokens: Arc::new(tokens),
            dispatcher,
            recorder: AuditRecorder::new(),
            policy: AccessPolicy,
            config,
            db_pool,
        }
    }

    // -- Reads --

    /// A document by reference, including soft-deleted ones.
    pub fn document(&self, id: DocumentRef) -> Option<Document> {
        self.documents.get(id.as_uuid())
    }

    /// Live signers of `document`, in `order`.
    pub fn signers_of(&self, document: DocumentRef) -> Vec<Signer> {
        let mut signers = self
            .signers
            .filter(|s| s.document == document && s.deleted_at.is_none());
        signsecure_state::signer::sort_by_order(&mut signers);
        signers
    }

    /// Live fields of `document`, oldest first.
    pub fn fields_of(&self, document: DocumentRef) -> Vec<FormField> {
        let mut fields = self
            .fields
            .filter(|f| f.document == document && f.is_live());
        fields.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        fields
    }

    /// Audit trail of `document`, newest first.
    pub fn events_of(&self, document: DocumentRef) -> Vec<AuditEvent> {
        let mut events = self.audit_events.filter(|e| e.document == document);
        signsecure_state::audit::sort_newest_first(&mut events);
        events
    }

    // -- Writes --

    /// Persist `unit` and apply it to the in-memory stores.
    ///
    /// The caller must hold the lock of every document the unit touches.
    pub async fn commit(&self, unit: UnitOfWork) -> Result<(), AppError> {
        if unit.is_empty() {
            return Ok(());
        }
        if let Some(pool) = &self.db_pool {
            crate::db::commit(pool, &unit).await?;
        }
        for d in unit.documents {
            self.documents.insert(d.id.0, d);
        }
        for s in unit.signers {
            self.signers.insert(s.id.0, s);
        }
        for f in unit.fields {
            self.fields.insert(f.id.0, f);
        }
        for e in unit.events {
            self.audit_events.insert(e.id.0, e);
        }
        Ok(())
    }

    /// Load all persisted records into the in-memory stores.
    ///
    /// No-op without a database pool.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let documents = crate::db::documents::load_all(pool)
            .await
            .map_err(|e| format!("failed to load documents: {e}"))?;
        let document_count = documents.len();
        for record in documents {
            self.documents.insert(record.id.0, record);
        }

        let signers = crate::db::signers::load_all(pool)
            .await
            .map_err(|e| format!("failed to load signers: {e}"))?;
        let signer_count = signers.len();
        for record in signers {
            self.signers.insert(record.id.0, record);
        }

        let fields = crate::db::fields::load_all(pool)
            .await
            .map_err(|e| format!("failed to load fields: {e}"))?;
        let field_count = fields.len();
        for record in fields {
            self.fields.insert(record.id.0, record);
        }

        let events = crate::db::audit::load_all(pool)
            .await
            .map_err(|e| format!("failed to load audit events: {e}"))?;
        let event_count = events.len();
        let newest: Option<Timestamp> = events.iter().map(|e| e.timestamp).max();
        for record in events {
            self.audit_events.insert(record.id.0, record);
        }
        if let Some(newest) = newest {
            self.recorder.observe(newest);
        }

        tracing::info!(
            documents = document_count,
            signers = signer_count,
            fields = field_count,
            audit_events = event_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signsecure_core::UserId;
    use std::time::Duration;

    #[test]
    fn store_insert_get_filter() {
        let store: Store<u32> = Store::new();
        let a = Uuid::new_v4();
        assert!(store.insert(a, 1).is_none());
        store.insert(Uuid::new_v4(), 2);
        assert_eq!(store.get(&a), Some(1));
        assert_eq!(store.filter(|v| *v > 1), vec![2]);
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }

    #[test]
    fn store_readability_respects_writers() {
        let store: Store<u32> = Store::new();
        assert!(store.is_readable_within(Duration::from_millis(10)));
        let held = store.hold_write();
        assert!(!store.is_readable_within(Duration::from_millis(10)));
        drop(held);
        assert!(store.is_readable_within(Duration::from_millis(10)));
    }

    #[test]
    fn store_clone_shares_data() {
        let store: Store<&'static str> = Store::new();
        let other = store.clone();
        let id = Uuid::new_v4();
        store.insert(id, "x");
        assert_eq!(other.get(&id), Some("x"));
    }

    #[tokio::test]
    async fn document_lock_is_exclusive() {
        let locks = DocumentLocks::default();
        let doc = DocumentRef::new();
        let guard = locks.acquire(doc).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(doc)).await;
        assert!(blocked.is_err());
        drop(guard);
        let reacquired = tokio::time::timeout(Duration::from_millis(200), locks.acquire(doc)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn released_lock_entries_are_pruned() {
        let locks = DocumentLocks::default();
        let doc = DocumentRef::new();
        let guard = locks.acquire(doc).await;
        assert_eq!(locks.len(), 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(doc).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        // The waiter still references the entry when the first guard drops.
        waiter.await.unwrap();
        assert!(locks.is_empty());

        let _a = locks.acquire(DocumentRef::new()).await;
        {
            let _b = locks.acquire(DocumentRef::new()).await;
            assert_eq!(locks.len(), 2);
        }
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn different_documents_do_not_contend() {
        let locks = DocumentLocks::default();
        let _a = locks.acquire(DocumentRef::new()).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire(DocumentRef::new())).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn commit_applies_without_pool() {
        let state = AppState::new();
        let doc = Document::new(UserId::new(), "Offer", "", Timestamp::now()).unwrap();
        let unit = UnitOfWork {
            documents: vec![doc.clone()],
            ..UnitOfWork::new()
        };
        assert_eq!(unit.touched_documents(), vec![doc.id]);
        state.commit(unit).await.unwrap();
        assert_eq!(state.document(doc.id), Some(doc));
    }

    #[test]
    fn short_token_secret_rejected() {
        let config = AppConfig {
            token_secret: Some(crate::config::SecretString::new("short")),
            ..AppConfig::default()
        };
        let err = AppState::with_config(config, Arc::new(LogMailer), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "token_secret", .. }));
    }
}
