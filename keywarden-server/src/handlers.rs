//! Request handlers for the access API.
//!
//! Handlers parse input, call the key service, and translate its outcomes to
//! responses. No lifecycle rules live here.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use keywarden_engine::lifecycle::{DEFAULT_TTL_MINUTES, DEFAULT_USAGE_LIMIT};
use keywarden_engine::{CheckOutcome, RedeemOutcome};
use keywarden_types::{KeyId, KeyRecord};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/keys`.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub value: String,
    #[serde(default = "default_usage_limit")]
    pub usage_limit: u32,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

fn default_usage_limit() -> u32 {
    DEFAULT_USAGE_LIMIT
}

fn default_ttl_minutes() -> i64 {
    DEFAULT_TTL_MINUTES
}

/// Body of `POST /api/v1/keys/redeem`.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub value: String,
    pub hwid: String,
}

/// Body of `POST /api/v1/keys/check`.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub hwid: String,
}

/// Wire form of a stored key record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySummary {
    pub id: KeyId,
    pub value: String,
    pub hwid: Option<String>,
    pub usage_limit: u32,
    pub uses: u32,
    pub expires_at: DateTime<Utc>,
}

impl From<KeyRecord> for KeySummary {
    fn from(record: KeyRecord) -> Self {
        Self {
            id: record.id,
            value: record.value,
            hwid: record.hwid,
            usage_limit: record.usage_limit,
            uses: record.uses,
            expires_at: record.expires_at,
        }
    }
}

/// Body of a successful redemption.
#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub status: String,
    pub uses: u32,
    pub usage_limit: u32,
}

/// Body of a successful hardware id check.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub value: String,
}

/// Body of `DELETE /api/v1/keys`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub deleted: u64,
}

/// Body of `GET /api/v1/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub sweep_interval_secs: u64,
}

pub async fn create_key(
    State(state): State<AppState>,
    payload: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<KeySummary>), ApiError> {
    let Json(req) = payload?;
    if req.value.is_empty() {
        return Err(ApiError::BadRequest("value must not be empty".into()));
    }
    let record = state
        .service
        .create(req.value, req.usage_limit, req.ttl_minutes)
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn redeem_key(
    State(state): State<AppState>,
    payload: Result<Json<RedeemRequest>, JsonRejection>,
) -> Result<Json<RedeemResponse>, ApiError> {
    let Json(req) = payload?;
    if req.value.is_empty() || req.hwid.is_empty() {
        return Err(ApiError::BadRequest(
            "value and hwid must not be empty".into(),
        ));
    }
    match state.service.redeem(&req.value, &req.hwid).await? {
        RedeemOutcome::Redeemed(record) => Ok(Json(RedeemResponse {
            status: "used".to_string(),
            uses: record.uses,
            usage_limit: record.usage_limit,
        })),
        RedeemOutcome::NotFound => Err(ApiError::NotFound),
        RedeemOutcome::HwidMismatch => Err(ApiError::HwidMismatch),
        RedeemOutcome::LimitReached => Err(ApiError::LimitReached),
        RedeemOutcome::Expired => Err(ApiError::Expired),
    }
}

pub async fn check_key(
    State(state): State<AppState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    let Json(req) = payload?;
    if req.hwid.is_empty() {
        return Err(ApiError::BadRequest("hwid must not be empty".into()));
    }
    match state.service.check_hwid(&req.hwid).await? {
        CheckOutcome::Valid { value } => Ok(Json(CheckResponse { value })),
        CheckOutcome::NotFound => Err(ApiError::NotFound),
        CheckOutcome::Expired => Err(ApiError::Expired),
    }
}

pub async fn list_keys(
    State(state): State<AppState>,
) -> Result<Json<Vec<KeySummary>>, ApiError> {
    let records = state.service.list().await?;
    Ok(Json(records.into_iter().map(KeySummary::from).collect()))
}

pub async fn purge_keys(State(state): State<AppState>) -> Result<Json<PurgeResponse>, ApiError> {
    let deleted = state.service.purge_all().await?;
    Ok(Json(PurgeResponse { deleted }))
}

pub async fn service_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "keywarden".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sweep_interval_secs: state.sweep_interval.as_secs(),
    })
}

pub async fn health() -> &'static str {
    "ok"
}
