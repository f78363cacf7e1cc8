//! # Notification Dispatcher
//!
//! Builds per-signer signing links and hands invitations to a [`Mailer`].
//!
//! Delivery is sequential in signer `order`. The first failure aborts the
//! remaining sends and is returned to the caller; invitations already
//! delivered are not recalled and the document state committed before
//! dispatch is not rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use signsecure_core::{DocumentRef, Email, SignerRef};
use signsecure_state::{Document, Signer};

/// Delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport refused or failed to deliver the message.
    #[error("failed to deliver invitation to {to}: {reason}")]
    Transport { to: String, reason: String },

    /// The signer has no token to put in the link.
    #[error("signer {0} has no signing token")]
    MissingToken(SignerRef),
}

/// A rendered signing invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub to: Email,
    pub from: String,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// HTML alternative of `body`.
    pub html_body: String,
    pub signing_url: String,
    pub document: DocumentRef,
    pub signer: SignerRef,
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one invitation.
    async fn send(&self, invitation: &Invitation) -> Result<(), DeliveryError>;
}

/// Writes invitations to the log instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, invitation: &Invitation) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %invitation.to,
            document = %invitation.document.short(),
            signer = %invitation.signer.short(),
            subject = %invitation.subject,
            "signing invitation"
        );
        Ok(())
    }
}

/// Keeps delivered invitations in memory.
///
/// An optional address can be configured to fail, to exercise partial
/// delivery.
#[derive(Debug, Clone, Default)]
pub struct OutboxMailer {
    sent: Arc<Mutex<Vec<Invitation>>>,
    reject: Option<Email>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outbox that fails every delivery to `address`.
    pub fn rejecting(address: Email) -> Self {
        Self {
            sent: Arc::default(),
            reject: Some(address),
        }
    }

    /// Invitations delivered so far, oldest first.
    pub fn sent(&self) -> Vec<Invitation> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, invitation: &Invitation) -> Result<(), DeliveryError> {
        if self.reject.as_ref() == Some(&invitation.to) {
            return Err(DeliveryError::Transport {
                to: invitation.to.to_string(),
                reason: "mailbox unavailable".into(),
            });
        }
        self.sent.lock().push(invitation.clone());
        Ok(())
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Base URL of the signing frontend, without trailing slash.
    pub frontend_url: String,
    /// Sender address.
    pub from_email: String,
    /// Token validity shown in the invitation text.
    pub expiry_days: i64,
}

/// Renders and sends signing invitations.
#[derive(Clone)]
pub struct NotificationDispatcher {
    config: NotifyConfig,
    mailer: Arc<dyn Mailer>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(config: NotifyConfig, mailer: Arc<dyn Mailer>) -> Self {
        let frontend_url = config.frontend_url.trim_end_matches('/').to_string();
        Self {
            config: NotifyConfig {
                frontend_url,
                ..config
            },
            mailer,
        }
    }

    /// `{frontend}/sign/{document}/{token}`.
    pub fn signing_url(&self, document: DocumentRef, token: &str) -> String {
        signing_url(&self.config.frontend_url, document, token)
    }

    /// Render the invitation for one signer.
    pub fn render(&self, document: &Document, signer: &Signer) -> Result<Invitation, DeliveryError> {
        let token = signer
            .token
            .as_deref()
            .ok_or(DeliveryError::MissingToken(signer.id))?;
        let signing_url = self.signing_url(document.id, token);
        let body = format!(
            "Hello {name},\n\n\
             You have been asked to sign \"{title}\".\n\n\
             Open the document here:\n{url}\n\n\
             This link expires in {days} days.\n",
            name = signer.name,
            title = document.title,
            url = signing_url,
            days = self.config.expiry_days,
        );
        let html_body = format!(
            "<!DOCTYPE html>\n\
             <html><body>\n\
             <p>Hello {name},</p>\n\
             <p>You have been asked to sign <strong>{title}</strong>.</p>\n\
             <p><a href=\"{url}\">Review and sign the document</a></p>\n\
             <p>This link expires in {days} days.</p>\n\
             </body></html>\n",
            name = html_escape(&signer.name),
            title = html_escape(&document.title),
            url = html_escape(&signing_url),
            days = self.config.expiry_days,
        );
        Ok(Invitation {
            to: signer.email.clone(),
            from: self.config.from_email.clone(),
            subject: format!("Please sign: {}", document.title),
            body,
            html_body,
            signing_url,
            document: document.id,
            signer: signer.id,
        })
    }

    /// Send one invitation per live signer, in `order`.
    ///
    /// Returns the number of invitations delivered.
    pub async fn notify_signers(
        &self,
        document: &Document,
        signers: &[Signer],
    ) -> Result<usize, DeliveryError> {
        let mut recipients: Vec<&Signer> = signers
            .iter()
            .filter(|s| s.document == document.id && s.deleted_at.is_none())
            .collect();
        recipients.sort_by_key(|s| (s.order, s.created_at));

        let mut delivered = 0;
        for signer in recipients {
            let invitation = self.render(document, signer)?;
            if let Err(e) = self.mailer.send(&invitation).await {
                tracing::warn!(
                    document = %document.id.short(),
                    signer = %signer.id.short(),
                    delivered,
                    error = %e,
                    "invitation dispatch aborted"
                );
                return Err(e);
            }
            delivered += 1;
        }

        tracing::info!(
            document = %document.id.short(),
            delivered,
            "signing invitations dispatched"
        );
        Ok(delivered)
    }
}

/// Build a signing link from its parts.
pub fn signing_url(frontend_url: &str, document: DocumentRef, token: &str) -> String {
    format!(
        "{}/sign/{}/{}",
        frontend_url.trim_end_matches('/'),
        document,
        token
    )
}

/// Escape text for HTML element content and double-quoted attributes.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use signsecure_core::{Timestamp, UserId};
    use signsecure_state::SignerDetails;

    fn config() -> NotifyConfig {
        NotifyConfig {
            frontend_url: "https://sign.example.com/".into(),
            from_email: "noreply@example.com".into(),
            expiry_days: 30,
        }
    }

    fn signer(doc: &Document, email: &str, order: u32) -> Signer {
        let mut s = Signer::new(
            doc.id,
            SignerDetails {
                email: Email::parse(email).unwrap(),
                name: email.split('@').next().unwrap().to_string(),
                role: String::new(),
                order,
            },
            Timestamp::now(),
        )
        .unwrap();
        s.set_token(format!("tok-{order}"), Timestamp::now());
        s
    }

    fn document() -> Document {
        Document::new(UserId::new(), "Lease", "", Timestamp::now()).unwrap()
    }

    #[test]
    fn link_has_no_double_slash() {
        let doc = DocumentRef::new();
        let url = signing_url("https://sign.example.com/", doc, "abc");
        assert_eq!(url, format!("https://sign.example.com/sign/{doc}/abc"));
    }

    #[test]
    fn invitation_content() {
        let outbox = OutboxMailer::new();
        let dispatcher = NotificationDispatcher::new(config(), Arc::new(outbox));
        let doc = document();
        let s = signer(&doc, "alice@example.com", 0);
        let inv = dispatcher.render(&doc, &s).unwrap();
        assert_eq!(inv.subject, "Please sign: Lease");
        assert_eq!(inv.from, "noreply@example.com");
        assert!(inv.body.contains("alice"));
        assert!(inv.body.contains("\"Lease\""));
        assert!(inv.body.contains(&inv.signing_url));
        assert!(inv.body.contains("30 days"));
        assert!(inv.signing_url.ends_with("/tok-0"));
    }

    #[test]
    fn html_alternative_escapes_user_text() {
        let dispatcher = NotificationDispatcher::new(config(), Arc::new(LogMailer));
        let doc = Document::new(
            UserId::new(),
            "Lease <script>alert(1)</script> & \"terms\"",
            "",
            Timestamp::now(),
        )
        .unwrap();
        let mut s = signer(&doc, "alice@example.com", 0);
        s.name = "O'Brien".into();
        let inv = dispatcher.render(&doc, &s).unwrap();

        assert!(inv.html_body.contains("Hello O&#39;Brien,"));
        assert!(inv
            .html_body
            .contains("<strong>Lease &lt;script&gt;alert(1)&lt;/script&gt; &amp; &quot;terms&quot;</strong>"));
        assert!(!inv.html_body.contains("<script>"));
        assert!(inv
            .html_body
            .contains(&format!("<a href=\"{}\">", inv.signing_url)));
        assert!(inv.html_body.contains("expires in 30 days"));
        // The plain-text part carries the raw title.
        assert!(inv.body.contains("<script>"));
    }

    #[test]
    fn missing_token_is_an_error() {
        let dispatcher = NotificationDispatcher::new(config(), Arc::new(LogMailer));
        let doc = document();
        let mut s = signer(&doc, "bob@example.com", 0);
        s.token = None;
        assert_eq!(
            dispatcher.render(&doc, &s).unwrap_err(),
            DeliveryError::MissingToken(s.id)
        );
    }

    #[tokio::test]
    async fn sends_in_order() {
        let outbox = OutboxMailer::new();
        let dispatcher = NotificationDispatcher::new(config(), Arc::new(outbox.clone()));
        let doc = document();
        let signers = vec![
            signer(&doc, "second@example.com", 2),
            signer(&doc, "first@example.com", 1),
        ];
        assert_eq!(dispatcher.notify_signers(&doc, &signers).await.unwrap(), 2);
        let sent: Vec<String> = outbox.sent().iter().map(|i| i.to.to_string()).collect();
        assert_eq!(sent, vec!["first@example.com", "second@example.com"]);
    }

    #[tokio::test]
    async fn first_failure_aborts_remaining() {
        let outbox = OutboxMailer::rejecting(Email::parse("b@example.com").unwrap());
        let dispatcher = NotificationDispatcher::new(config(), Arc::new(outbox.clone()));
        let doc = document();
        let signers = vec![
            signer(&doc, "a@example.com", 0),
            signer(&doc, "b@example.com", 1),
            signer(&doc, "c@example.com", 2),
        ];
        let err = dispatcher.notify_signers(&doc, &signers).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport { .. }));
        assert_eq!(outbox.sent().len(), 1);
    }

    #[tokio::test]
    async fn deleted_signers_are_skipped() {
        let outbox = OutboxMailer::new();
        let dispatcher = NotificationDispatcher::new(config(), Arc::new(outbox.clone()));
        let doc = document();
        let mut gone = signer(&doc, "gone@example.com", 0);
        gone.soft_delete(Timestamp::now());
        let kept = signer(&doc, "kept@example.com", 1);
        assert_eq!(dispatcher.notify_signers(&doc, &[gone, kept]).await.unwrap(), 1);
    }
}
