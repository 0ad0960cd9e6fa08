//! Axum request handlers for all service endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, ErrorResponse,
    HealthResponse,
};
use common::ServiceError;
use tracing::warn;

use super::state::AppState;

/// `POST /v1/fields/encrypt` — encrypt one attribute for an identity.
///
/// An empty plaintext yields `{"field": null}`.
pub async fn encrypt(State(state): State<AppState>, Json(req): Json<EncryptRequest>) -> Response {
    if let Err(err) = require_identity(&req.identity) {
        return error_response(err);
    }
    match state.cipher.encrypt_field(&req.identity, &req.plaintext).await {
        Ok(field) => (StatusCode::OK, Json(EncryptResponse { field })).into_response(),
        Err(e) => {
            warn!(error = %e, "encrypt failed");
            error_response(e.into())
        }
    }
}

/// `POST /v1/fields/decrypt` — decrypt one stored attribute for an identity.
///
/// Absent or unreadable fields yield `{"plaintext": ""}`; only storage
/// unavailability is an error.
pub async fn decrypt(State(state): State<AppState>, Json(req): Json<DecryptRequest>) -> Response {
    if let Err(err) = require_identity(&req.identity) {
        return error_response(err);
    }
    match state
        .cipher
        .decrypt_field_or_empty(&req.identity, req.field.as_ref())
        .await
    {
        Ok(plaintext) => (StatusCode::OK, Json(DecryptResponse { plaintext })).into_response(),
        Err(e) => {
            warn!(error = %e, "decrypt failed");
            error_response(e.into())
        }
    }
}

/// `DELETE /v1/keys/{identity}` — wipe an identity's key (account deletion / logout-and-wipe).
pub async fn clear_key(State(state): State<AppState>, Path(identity): Path<String>) -> Response {
    if let Err(err) = require_identity(&identity) {
        return error_response(err);
    }
    match state.cipher.keys().clear_key(&identity).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "clear key failed");
            error_response(ServiceError::StorageUnavailable)
        }
    }
}

/// `GET /health` — liveness and readiness check.
///
/// Returns `200 OK` when the durable key store answers its probe and
/// `503 Service Unavailable` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let keys = state.cipher.keys();
    let storage_available = keys.probe().await.is_ok();
    let cached_keys = keys.cached_len().await;

    let (status_code, status_str) = if storage_available {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        storage_available,
        cached_keys,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn require_identity(identity: &str) -> Result<(), ServiceError> {
    if identity.trim().is_empty() {
        return Err(ServiceError::BadRequest("identity must not be empty".into()));
    }
    Ok(())
}

fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(&err))).into_response()
}
