//! # Custom Extractors & Validation
//!
//! - [`Validate`] for request DTOs, with [`extract_json`] /
//!   [`extract_validated_json`] mapping body rejections to 422.
//! - [`RequestContext`]: client IP and user agent, recorded on audit events.
//! - [`parse_ref`]: path reference parsing where an unparseable reference is
//!   simply a missing record.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::Json;
use axum_extra::headers::UserAgent;
use axum_extra::TypedHeader;

use crate::error::AppError;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::Validation`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse a path reference. Anything unparseable is reported as not found.
pub fn parse_ref<T: FromStr>(raw: &str, kind: &str) -> Result<T, AppError> {
    raw.parse::<T>()
        .map_err(|_| AppError::NotFound(kind.to_string()))
}

/// Where the audit client address comes from. Read from request
/// extensions; absent means the peer address only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientAddressPolicy {
    /// Prefer the first `X-Forwarded-For` hop over the peer address.
    pub trust_forwarded: bool,
}

/// Client metadata recorded on audit events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Client address. The first `X-Forwarded-For` hop when forwarded
    /// headers are trusted and it parses, else the peer address.
    pub ip_address: Option<IpAddr>,
    /// `User-Agent` header, empty when absent.
    pub user_agent: String,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let policy = parts
            .extensions
            .get::<ClientAddressPolicy>()
            .copied()
            .unwrap_or_default();
        let forwarded = policy
            .trust_forwarded
            .then(|| forwarded_client(&parts.headers))
            .flatten();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let user_agent = TypedHeader::<UserAgent>::from_request_parts(parts, state)
            .await
            .map(|TypedHeader(ua)| ua.as_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            ip_address: forwarded.or(peer),
            user_agent,
        })
    }
}

/// First `X-Forwarded-For` hop, if it is an IP address.
fn forwarded_client(headers: &axum::http::HeaderMap) -> Option<IpAddr> {
    let first = headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim();
    match first.parse() {
        Ok(ip) => Some(ip),
        Err(_) => {
            tracing::debug!(value = first, "ignoring unparseable X-Forwarded-For");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn context_of(req: Request<()>) -> RequestContext {
        let (mut parts, _) = req.into_parts();
        RequestContext::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    fn with_peer(mut req: Request<()>, trust_forwarded: bool) -> Request<()> {
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5555))));
        req.extensions_mut()
            .insert(ClientAddressPolicy { trust_forwarded });
        req
    }

    fn forwarded(value: &str) -> Request<()> {
        Request::builder()
            .header("x-forwarded-for", value)
            .header("user-agent", "curl/8.5")
            .body(())
            .unwrap()
    }

    #[tokio::test]
    async fn forwarded_for_ignored_unless_trusted() {
        let ctx = context_of(with_peer(forwarded("203.0.113.7, 10.0.0.1"), false)).await;
        assert_eq!(ctx.ip_address, Some(IpAddr::from([192, 0, 2, 4])));
        assert_eq!(ctx.user_agent, "curl/8.5");

        // No policy in extensions behaves as untrusted.
        let ctx = context_of(forwarded("203.0.113.7")).await;
        assert_eq!(ctx.ip_address, None);
    }

    #[tokio::test]
    async fn trusted_forwarded_for_uses_first_hop() {
        let ctx = context_of(with_peer(forwarded("203.0.113.7, 10.0.0.1"), true)).await;
        assert_eq!(ctx.ip_address, Some(IpAddr::from([203, 0, 113, 7])));

        let ctx = context_of(with_peer(forwarded(" 2001:db8::1 "), true)).await;
        assert_eq!(ctx.ip_address, Some("2001:db8::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn unparseable_forwarded_for_falls_back_to_peer() {
        for junk in ["not-an-ip; DROP", "", "203.0.113.7:443", "unknown, 10.0.0.1"] {
            let ctx = context_of(with_peer(forwarded(junk), true)).await;
            assert_eq!(ctx.ip_address, Some(IpAddr::from([192, 0, 2, 4])), "{junk:?}");
        }
    }

    #[tokio::test]
    async fn peer_address_fallback() {
        let req = with_peer(Request::builder().body(()).unwrap(), true);
        let ctx = context_of(req).await;
        assert_eq!(ctx.ip_address, Some(IpAddr::from([192, 0, 2, 4])));
        assert_eq!(ctx.user_agent, "");
    }

    #[test]
    fn unparseable_ref_is_not_found() {
        let err = parse_ref::<signsecure_core::DocumentRef>("42", "document").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
