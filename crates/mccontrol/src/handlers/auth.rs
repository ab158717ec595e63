//! Public key-exchange routes.

use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{required, success, ApiBody, ApiResult};
use crate::ControlState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// GET /api/handshake
pub async fn handshake(State(state): State<Arc<ControlState>>) -> ApiResult {
    let offer = state.credentials.handshake_offer();
    Ok(success(json!({
        "publicKey": offer.public_key,
        "algorithm": offer.algorithm,
        "keySize": offer.key_size,
    })))
}

/// POST /api/auth
pub async fn authenticate(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<AuthRequest>,
) -> ApiResult {
    let api_key = required("apiKey", request.api_key)?;
    let session_id = required("sessionId", request.session_id)?;

    let key = mccontrol_vault::authenticate(
        &state.credentials,
        &state.sessions,
        &api_key,
        &session_id,
    )?;
    Ok(success(json!({
        "authenticated": true,
        "sessionKey": key.to_base64(),
    })))
}
