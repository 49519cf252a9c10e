use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, Caller};
use crate::crypto::Commitment;
use crate::error::CustodyError;
use crate::ledger::models::{AssetId, Principal};
use crate::roles::Role;
use crate::service::CustodyService;
use crate::transport::{HandoverPayload, HandoverTransport, TextTransport};

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    pub name: String,
    pub consumer_commitment: Commitment,
    pub handover_commitment: Commitment,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct HandoverRequest {
    pub next_commitment: Commitment,
}

/// Either a bare `secret` or a scanned `payload` in the text transport
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub secret: Option<String>,
    pub payload: Option<String>,
    pub next_commitment: Commitment,
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub location: String,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub secret: String,
    pub customer_name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
    pub principal: Principal,
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult {
    Ok(Json(serde_json::to_value(value).map_err(CustodyError::from)?))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "custody-ledger",
        "timestamp": chrono::Utc::now()
    }))
}

pub async fn create_asset(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Json(request): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let asset = service
        .create_asset(
            &caller,
            &request.name,
            request.consumer_commitment,
            request.handover_commitment,
            &request.location,
        )
        .await?;
    Ok((StatusCode::CREATED, to_json(&asset)?))
}

pub async fn get_asset(State(service): State<CustodyService>, Path(id): Path<AssetId>) -> ApiResult {
    to_json(&service.get_asset(id).await?)
}

pub async fn get_history(
    State(service): State<CustodyService>,
    Path(id): Path<AssetId>,
) -> ApiResult {
    to_json(&service.displayed_history(id).await?)
}

pub async fn get_verifications(
    State(service): State<CustodyService>,
    Path(id): Path<AssetId>,
) -> ApiResult {
    to_json(&service.get_verifications(id).await?)
}

pub async fn verify_integrity(
    State(service): State<CustodyService>,
    Path(id): Path<AssetId>,
) -> ApiResult {
    to_json(&service.verify_integrity(id).await?)
}

pub async fn generate_handover(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Path(id): Path<AssetId>,
    Json(request): Json<HandoverRequest>,
) -> ApiResult {
    to_json(
        &service
            .generate_handover(&caller, id, request.next_commitment)
            .await?,
    )
}

/// Issue a server-generated secret. The response carries the secret and its
/// text transport form for the next custodian.
pub async fn issue_handover(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Path(id): Path<AssetId>,
) -> ApiResult {
    let (asset, pending) = service.issue_handover(&caller, id).await?;
    let payload = TextTransport.encode(&HandoverPayload::new(id, pending.secret.clone(), caller))?;
    Ok(Json(json!({
        "asset": asset,
        "pending": pending,
        "payload": payload
    })))
}

pub async fn pending_handover(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Path(id): Path<AssetId>,
) -> ApiResult {
    let pending = service.pending_handover(&caller, id).await?;
    Ok(Json(json!({ "pending": pending })))
}

pub async fn accept_handover(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Path(id): Path<AssetId>,
    Json(request): Json<AcceptRequest>,
) -> ApiResult {
    let secret = match (request.secret, request.payload) {
        (Some(secret), _) => secret,
        (None, Some(raw)) => {
            let payload = TextTransport.decode(&raw)?;
            if payload.asset_id != id {
                return Err(CustodyError::InvalidInput(format!(
                    "Payload is for asset {}, not {}",
                    payload.asset_id, id
                ))
                .into());
            }
            payload.secret
        }
        (None, None) => {
            return Err(CustodyError::InvalidInput(
                "Either secret or payload is required".to_string(),
            )
            .into())
        }
    };

    let receipt = service
        .accept_handover_checked(&caller, id, &secret, request.next_commitment, &request.location)
        .await?;
    to_json(&receipt)
}

pub async fn record_verification(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Path(id): Path<AssetId>,
    Json(request): Json<VerificationRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let event = service
        .record_verification(&caller, id, &request.location, &request.remarks)
        .await?;
    Ok((StatusCode::CREATED, to_json(&event)?))
}

pub async fn claim_ownership(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Path(id): Path<AssetId>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult {
    let outcome = service
        .claim_ownership(
            &caller,
            id,
            &request.secret,
            &request.customer_name,
            &request.location,
        )
        .await?;
    to_json(&outcome)
}

pub async fn grant_role(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Json(request): Json<RoleRequest>,
) -> ApiResult {
    let changed = service
        .grant_role(&caller, request.role, &request.principal)
        .await?;
    Ok(Json(json!({
        "role": request.role,
        "principal": request.principal,
        "changed": changed
    })))
}

pub async fn revoke_role(
    State(service): State<CustodyService>,
    Caller(caller): Caller,
    Json(request): Json<RoleRequest>,
) -> ApiResult {
    let changed = service
        .revoke_role(&caller, request.role, &request.principal)
        .await?;
    Ok(Json(json!({
        "role": request.role,
        "principal": request.principal,
        "changed": changed
    })))
}

pub async fn has_role(
    State(service): State<CustodyService>,
    Path((role, principal)): Path<(String, String)>,
) -> ApiResult {
    let role: Role = role.parse().map_err(CustodyError::InvalidInput)?;
    let principal = Principal::new(&principal)?;
    let holds = service.has_role(role, &principal).await?;
    Ok(Json(json!({
        "role": role,
        "principal": principal,
        "has_role": holds
    })))
}
