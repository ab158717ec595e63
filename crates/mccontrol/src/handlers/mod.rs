//! Route handlers. Each one validates the request shape and forwards to the
//! credential store, the path sandbox or the host.

pub mod auth;
pub mod files;
pub mod host;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use mccontrol_core::ControlError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::http::ApiError;

pub type ApiResult = Result<Json<Value>, ApiError>;

/// `Query` that rejects with the JSON error envelope.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// A JSON body read through [`parse_body`]. Oversized or unreadable bodies
/// reject with the JSON error envelope too.
pub struct ApiBody<T>(pub T);

impl<T, S> FromRequest<S> for ApiBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state).await?;
        parse_body(&body).map(ApiBody)
    }
}

/// Parse a JSON body. An empty body parses as `{}` so missing-field checks
/// produce their own message.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };
    serde_json::from_slice(raw).map_err(|e| ApiError(ControlError::from(e)))
}

/// `{"success": true}` merged with `fields`, which must be an object.
pub(crate) fn success(fields: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    if let Value::Object(extra) = fields {
        body.extend(extra);
    }
    Json(Value::Object(body))
}

/// `success` with a serializable record flattened into the body.
pub(crate) fn success_with<T: Serialize>(record: &T) -> ApiResult {
    let value = serde_json::to_value(record)
        .map_err(|e| ApiError(ControlError::Internal(e.to_string())))?;
    Ok(success(value))
}

/// A required, non-blank string field.
pub(crate) fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError(ControlError::Invalid(format!(
            "{} is required",
            field
        )))),
    }
}

/// Validate a `uuid` query parameter and normalize it to lowercase
/// hyphenated form.
pub(crate) fn require_uuid(value: Option<&str>) -> Result<String, ApiError> {
    let raw = value.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(ApiError(ControlError::Invalid(
            "UUID parameter required".into(),
        )));
    }
    uuid::Uuid::parse_str(raw)
        .map(|u| u.hyphenated().to_string())
        .map_err(|_| ApiError(ControlError::Invalid("Invalid UUID".into())))
}

pub(crate) fn accepted() -> Json<Value> {
    success(json!({ "accepted": true }))
}
