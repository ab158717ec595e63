//! Axum router for the control API.
//!
//! Every route lives under `/api`. `handshake` and `auth` are public; every
//! other route sits behind [`require_bearer`], which is installed as a route
//! layer so it runs before the per-route method check. The order per request
//! is therefore: bearer check (401), method check (405), handler.

use axum::{
    extract::rejection::{BytesRejection, QueryRejection},
    extract::{DefaultBodyLimit, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use mccontrol_core::ControlError;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tracing::{debug, error, warn};

use crate::handlers::{auth, files, host};
use crate::ControlState;

pub const API_PREFIX: &str = "/api";

/// Error envelope: `{"error": "<message>"}` with the matching status.
#[derive(Debug)]
pub struct ApiError(pub ControlError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if self.0.is_internal() {
            error!(error = %self.0, "request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.public_message() }))).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        ApiError(e)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(ControlError::Invalid(rejection.body_text()))
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError(ControlError::TooLarge("Request body too large".into()))
        } else {
            ApiError(ControlError::Invalid(rejection.body_text()))
        }
    }
}

impl From<mccontrol_vault::VaultError> for ApiError {
    fn from(e: mccontrol_vault::VaultError) -> Self {
        ApiError(e.into())
    }
}

impl From<mccontrol_files::FilesError> for ApiError {
    fn from(e: mccontrol_files::FilesError) -> Self {
        ApiError(e.into())
    }
}

impl From<mccontrol_host::HostError> for ApiError {
    fn from(e: mccontrol_host::HostError) -> Self {
        ApiError(e.into())
    }
}

/// Build the full router, CORS and panic handling included.
pub fn build_router(state: Arc<ControlState>) -> Router {
    let body_limit = state.config.http.max_body_bytes;

    let public = Router::new()
        .route("/handshake", guarded(get(auth::handshake)))
        .route("/auth", guarded(post(auth::authenticate)));

    let protected = Router::new()
        .route("/metrics", guarded(get(host::metrics)))
        .route("/players", guarded(get(host::players)))
        .route("/player", guarded(get(host::player).post(host::player_action)))
        .route(
            "/whitelist",
            guarded(
                get(host::whitelist)
                    .post(host::whitelist_add)
                    .delete(host::whitelist_remove),
            ),
        )
        .route(
            "/blacklist",
            guarded(
                get(host::blacklist)
                    .post(host::blacklist_add)
                    .delete(host::blacklist_remove),
            ),
        )
        .route(
            "/ops",
            guarded(get(host::ops).post(host::ops_add).delete(host::ops_remove)),
        )
        .route("/plugins", guarded(get(host::plugins)))
        .route("/server", guarded(get(host::server)))
        .route("/console", guarded(get(host::console)))
        .route("/chat", guarded(get(host::chat).post(host::send_chat)))
        .route("/command", guarded(post(host::command)))
        .route("/logs", guarded(get(host::logs)))
        .route(
            "/settings",
            guarded(get(host::settings).post(host::update_settings)),
        )
        .route(
            "/settings/properties",
            guarded(get(host::properties).post(host::update_properties)),
        )
        .route(
            "/settings/gamerules",
            guarded(get(host::gamerules).post(host::update_gamerules)),
        )
        .route("/restart", guarded(post(host::restart)))
        .route(
            "/files",
            guarded(
                get(files::list)
                    .post(files::modify)
                    .delete(files::delete),
            ),
        )
        .route(
            "/files/content",
            guarded(get(files::read).post(files::write)),
        )
        .route("/files/changelog", guarded(get(files::changelog)))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_bearer,
        ));

    Router::new()
        .nest(API_PREFIX, public.merge(protected))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any),
        )
}

/// Unsupported methods on a known route answer with the JSON 405 envelope.
fn guarded(route: MethodRouter<Arc<ControlState>>) -> MethodRouter<Arc<ControlState>> {
    route.fallback(method_not_allowed)
}

/// Require `Authorization: Bearer <api key>`; compared in constant time.
pub async fn require_bearer(
    State(state): State<Arc<ControlState>>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if state.credentials.api_key_matches(token.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            warn!(path = %request.uri().path(), "rejected request without a valid bearer token");
            ApiError(ControlError::unauthorized()).into_response()
        }
    }
}

async fn method_not_allowed() -> ApiError {
    ApiError(ControlError::MethodNotAllowed)
}

async fn not_found() -> ApiError {
    ApiError(ControlError::NotFound("Not found".into()))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ApiError(ControlError::Internal(format!("handler panicked: {}", detail))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_api_error_envelope() {
        let response = ApiError(ControlError::PathEscape).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_of(response).await;
        assert!(body["error"].as_str().unwrap().contains("outside"));
        assert!(body.get("success").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let response =
            ApiError(ControlError::Internal("disk /srv/secret failed".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_panic_response_is_json_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await["error"], "Internal server error");
    }

    #[test]
    fn test_rejected_file_error_detail_is_logged() {
        use crate::console::ConsoleMakeWriter;
        use mccontrol_host::LogHub;
        use tracing_subscriber::layer::SubscriberExt;

        let logs = Arc::new(LogHub::in_memory());
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(ConsoleMakeWriter::new(&logs));
        let subscriber = tracing_subscriber::registry().with(layer);

        let response = tracing::subscriber::with_default(subscriber, || {
            let io = std::io::Error::new(std::io::ErrorKind::NotFound, "stat plugins/x.yml");
            ApiError::from(mccontrol_files::FilesError::Io(io)).into_response()
        });

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let lines = logs.console_lines();
        assert!(lines.iter().any(|l| l.contains("stat plugins/x.yml")));
        assert!(lines.iter().any(|l| l.contains("request rejected")));
    }

    #[test]
    fn test_from_files_error() {
        let err: ApiError = mccontrol_files::FilesError::NotFound.into();
        assert_eq!(err.0.status_code(), 404);
    }
}
