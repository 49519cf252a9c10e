//! HTTP surface
//!
//! JSON routes over `CustodyService`. The calling principal is taken from
//! the `x-principal` header.

pub mod handlers;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::CustodyError;
use crate::ledger::models::Principal;
use crate::service::CustodyService;

pub const PRINCIPAL_HEADER: &str = "x-principal";

pub fn router(service: CustodyService) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/assets", post(handlers::create_asset))
        .route("/assets/:id", get(handlers::get_asset))
        .route("/assets/:id/history", get(handlers::get_history))
        .route(
            "/assets/:id/verifications",
            get(handlers::get_verifications).post(handlers::record_verification),
        )
        .route("/assets/:id/integrity", get(handlers::verify_integrity))
        .route("/assets/:id/handover", post(handlers::generate_handover))
        .route("/assets/:id/handover/issue", post(handlers::issue_handover))
        .route("/assets/:id/handover/pending", get(handlers::pending_handover))
        .route("/assets/:id/accept", post(handlers::accept_handover))
        .route("/assets/:id/claim", post(handlers::claim_ownership))
        .route("/roles/grant", post(handlers::grant_role))
        .route("/roles/revoke", post(handlers::revoke_role))
        .route("/roles/:role/:principal", get(handlers::has_role))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(service)
}

/// Principal named by the `x-principal` header
pub struct Caller(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(ApiError::missing_principal)?;
        Principal::new(value)
            .map(Caller)
            .map_err(|_| ApiError::missing_principal())
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn missing_principal() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "missing_principal",
            message: format!("Missing or empty {} header", PRINCIPAL_HEADER),
        }
    }
}

impl From<CustodyError> for ApiError {
    fn from(err: CustodyError) -> Self {
        let status = match &err {
            CustodyError::Unauthorized { .. }
            | CustodyError::NotOwner { .. }
            | CustodyError::InvalidSecret(_) => StatusCode::FORBIDDEN,
            CustodyError::NotFound(_) => StatusCode::NOT_FOUND,
            CustodyError::StaleCommitment(_) | CustodyError::IntegrityMismatch { .. } => {
                StatusCode::CONFLICT
            }
            CustodyError::TerminalAsset(_) => StatusCode::GONE,
            CustodyError::InvalidInput(_) | CustodyError::Transport(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CustodyError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CustodyError::Database(_) | CustodyError::Config(_) => {
                error!("Internal error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({
                "error": self.message,
                "kind": self.kind,
            })),
        )
            .into_response()
    }
}
