//! File routes. Sandbox calls and change-log writes block on disk I/O and run
//! on the blocking pool.

use axum::extract::State;
use mccontrol_core::ControlError;
use mccontrol_files::{FileChange, FilesResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{required, success, success_with, ApiBody, ApiQuery, ApiResult};
use crate::http::ApiError;
use crate::ControlState;

#[derive(Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    path: Option<String>,
}

impl PathQuery {
    fn path(self) -> String {
        self.path.unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyBody {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    new_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    is_base64: bool,
}

/// Run file work on the blocking pool. The sandbox call and its change-log
/// entry both touch the disk, so both go inside `op`.
async fn blocking<T, F>(state: &Arc<ControlState>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ControlState) -> FilesResult<T> + Send + 'static,
{
    let state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || op(&state))
        .await
        .map_err(|e| ApiError(ControlError::Internal(format!("file task failed: {}", e))))?;
    Ok(result?)
}

fn display(relative: &str) -> String {
    format!("/{}", relative)
}

/// GET /api/files?path=
pub async fn list(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<PathQuery>,
) -> ApiResult {
    let path = query.path();
    let listing = blocking(&state, move |state| state.sandbox.list(&path)).await?;
    success_with(&listing)
}

/// POST /api/files?path=  `{action: "rename", newName}` or `{action: "mkdir"}`
pub async fn modify(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<PathQuery>,
    ApiBody(request): ApiBody<ModifyBody>,
) -> ApiResult {
    let action = required("action", request.action)?;
    let path = query.path();

    match action.as_str() {
        "rename" => {
            let new_name = required("newName", request.new_name)?;
            let to = blocking(&state, move |state| {
                let outcome = state.sandbox.rename(&path, &new_name)?;
                let to = display(&outcome.to);
                state.changelog.record(&FileChange::Rename {
                    from: display(&outcome.from),
                    to: to.clone(),
                });
                Ok(to)
            })
            .await?;
            Ok(success(json!({
                "message": "Renamed successfully",
                "newPath": to,
            })))
        }
        "mkdir" => {
            blocking(&state, move |state| {
                let created = state.sandbox.mkdir(&path)?;
                state
                    .changelog
                    .record(&FileChange::CreateFolder(display(&created)));
                Ok(())
            })
            .await?;
            Ok(success(json!({ "message": "Folder created" })))
        }
        other => Err(ApiError(ControlError::Invalid(format!(
            "Unknown action: {}",
            other
        )))),
    }
}

/// DELETE /api/files?path=
pub async fn delete(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<PathQuery>,
) -> ApiResult {
    let path = query.path();
    blocking(&state, move |state| {
        let removed = state.sandbox.delete(&path)?;
        state.changelog.record(&FileChange::Delete(display(&removed)));
        Ok(())
    })
    .await?;
    Ok(success(json!({ "message": "Deleted successfully" })))
}

/// GET /api/files/content?path=
pub async fn read(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<PathQuery>,
) -> ApiResult {
    let path = query.path();
    let content = blocking(&state, move |state| state.sandbox.read(&path)).await?;
    success_with(&content)
}

/// POST /api/files/content?path=  `{content, isBase64}`
pub async fn write(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<PathQuery>,
    ApiBody(request): ApiBody<WriteBody>,
) -> ApiResult {
    let content = request
        .content
        .ok_or_else(|| ApiError(ControlError::Invalid("content is required".into())))?;
    let path = query.path();
    let is_base64 = request.is_base64;

    let backup = blocking(&state, move |state| {
        let outcome = state.sandbox.write(&path, &content, is_base64)?;
        let shown = display(&outcome.path);
        let change = if outcome.created {
            FileChange::Create(shown)
        } else {
            FileChange::Edit(shown)
        };
        state.changelog.record(&change);
        Ok(outcome.backup)
    })
    .await?;

    let mut fields = json!({ "message": "File saved" });
    if let Some(backup) = backup {
        fields["backup"] = json!(display(&backup));
    }
    Ok(success(fields))
}

/// GET /api/files/changelog
pub async fn changelog(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "entries": state.changelog.entries() })))
}
