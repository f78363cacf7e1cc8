//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented handler into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer scheme used by every `/v1/*` route except signing links.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("`Bearer {user_uuid}:{email}[:{secret}]`"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SignSecure API",
        description = "Document e-signature workflow: documents, signers, form fields, signing links and the audit trail.\n\nAuthentication: `Authorization: Bearer` for all `/v1/*` routes except `/v1/signing/*`, which authenticate with the signer token in the path.",
        license(name = "AGPL-3.0-or-later")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Documents ───────────────────────────────────────────────────
        crate::routes::documents::create_document,
        crate::routes::documents::list_documents,
        crate::routes::documents::get_document,
        crate::routes::documents::update_document,
        crate::routes::documents::delete_document,
        crate::routes::documents::upload_document,
        crate::routes::documents::send_for_signature,
        // ── Signers ─────────────────────────────────────────────────────
        crate::routes::signers::create_signer,
        crate::routes::signers::list_signers,
        crate::routes::signers::get_signer,
        crate::routes::signers::update_signer,
        crate::routes::signers::delete_signer,
        crate::routes::signers::mark_as_viewed,
        crate::routes::signers::sign_document,
        // ── Form fields ─────────────────────────────────────────────────
        crate::routes::fields::create_field,
        crate::routes::fields::list_fields,
        crate::routes::fields::get_field,
        crate::routes::fields::update_field,
        crate::routes::fields::delete_field,
        // ── Audit trail ─────────────────────────────────────────────────
        crate::routes::audit_trail::list_events,
        crate::routes::audit_trail::get_event,
        // ── Signing links ───────────────────────────────────────────────
        crate::routes::signing::open_link,
        crate::routes::signing::sign_via_link,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::documents::CreateDocumentRequest,
        crate::routes::documents::UpdateDocumentRequest,
        crate::routes::documents::UploadRequest,
        crate::routes::signers::CreateSignerRequest,
        crate::routes::signers::UpdateSignerRequest,
        crate::routes::fields::CreateFieldRequest,
        crate::routes::fields::UpdateFieldRequest,
        crate::routes::signing::SignRequest,
        crate::views::DocumentView,
        crate::views::DocumentDetailView,
        crate::views::SignerView,
        crate::views::FieldView,
        crate::views::AuditEventView,
        crate::views::StatusView,
        crate::views::SendView,
        crate::views::SignView,
        crate::views::SigningSessionView,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "documents", description = "Documents and their lifecycle"),
        (name = "signers", description = "Signers and owner-side signing actions"),
        (name = "fields", description = "Form field placement"),
        (name = "audit-trail", description = "Read-only audit events"),
        (name = "signing", description = "Signer-facing signing links"),
    )
)]
pub struct ApiDoc;

/// Router serving the generated document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_resource() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        for path in [
            "/v1/documents",
            "/v1/documents/{ref}",
            "/v1/documents/{ref}/upload",
            "/v1/documents/{ref}/send_for_signature",
            "/v1/signers",
            "/v1/signers/{ref}/mark_as_viewed",
            "/v1/signers/{ref}/sign_document",
            "/v1/fields/{ref}",
            "/v1/audit-trail",
            "/v1/signing/{document}/{token}/sign",
        ] {
            assert!(paths.contains_key(path), "missing path {path}");
        }
    }

    #[test]
    fn spec_has_schemas_and_security() {
        let spec = ApiDoc::openapi();
        let components = spec.components.as_ref().unwrap();
        for name in ["DocumentView", "SignerView", "FieldView", "ErrorBody"] {
            assert!(components.schemas.contains_key(name), "missing {name}");
        }
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn signer_view_never_documents_a_token() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let props = &json["components"]["schemas"]["SignerView"]["properties"];
        assert!(props.get("email").is_some());
        assert!(props.get("token").is_none());
    }
}
