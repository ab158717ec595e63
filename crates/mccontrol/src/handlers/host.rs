//! Host routes. Reads come from the published host snapshot; mutations are
//! queued as [`HostCommand`]s and acknowledged as accepted, not applied.

use axum::extract::State;
use mccontrol_core::{ControlError, ListEntry, PlayerAction};
use mccontrol_host::HostCommand;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    accepted, require_uuid, required, success, success_with, ApiBody, ApiQuery, ApiResult,
};
use crate::http::ApiError;
use crate::ControlState;

#[derive(Deserialize)]
pub struct UuidQuery {
    uuid: Option<String>,
}

#[derive(Deserialize)]
pub struct ListEntryBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
}

#[derive(Deserialize)]
pub struct ActionBody {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Deserialize)]
pub struct CommandBody {
    #[serde(default)]
    command: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
pub struct SettingsBody {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    gamerules: Option<Map<String, Value>>,
}

async fn submit(state: &ControlState, command: HostCommand) -> ApiResult {
    state.queue.submit(command).await?;
    Ok(accepted())
}

fn to_btree(map: Map<String, Value>) -> BTreeMap<String, Value> {
    map.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Metrics, players
// ---------------------------------------------------------------------------

/// GET /api/metrics
pub async fn metrics(State(state): State<Arc<ControlState>>) -> ApiResult {
    let snapshots = state.metrics.snapshots();
    Ok(success(json!({
        "count": snapshots.len(),
        "metrics": snapshots,
    })))
}

/// GET /api/players
pub async fn players(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "players": state.host.players() })))
}

/// GET /api/player?uuid=
pub async fn player(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<UuidQuery>,
) -> ApiResult {
    let uuid = require_uuid(query.uuid.as_deref())?;
    match state.host.player(&uuid) {
        Some(record) => success_with(&record),
        None => Err(ApiError(ControlError::NotFound("Player not found".into()))),
    }
}

/// POST /api/player?uuid=  `{action}`
pub async fn player_action(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<UuidQuery>,
    ApiBody(request): ApiBody<ActionBody>,
) -> ApiResult {
    let uuid = require_uuid(query.uuid.as_deref())?;
    let action: PlayerAction = required("action", request.action)?
        .parse()
        .map_err(|msg: String| ApiError(ControlError::Invalid(msg)))?;

    info!(uuid = %uuid, action = %action, "player action requested");
    submit(&state, HostCommand::Player { uuid, action }).await
}

// ---------------------------------------------------------------------------
// Whitelist, ban list, operators
// ---------------------------------------------------------------------------

fn list_entry(request: ListEntryBody) -> Result<ListEntry, ApiError> {
    let uuid = require_uuid(request.uuid.as_deref())?;
    Ok(ListEntry {
        name: request.name.map(|n| n.trim().to_string()).unwrap_or_default(),
        uuid,
    })
}

/// GET /api/whitelist
pub async fn whitelist(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({
        "whitelist": state.host.whitelist(),
        "enabled": state.host.whitelist_enabled(),
    })))
}

/// POST /api/whitelist  `{name, uuid}`
pub async fn whitelist_add(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<ListEntryBody>,
) -> ApiResult {
    let entry = list_entry(request)?;
    submit(&state, HostCommand::WhitelistAdd(entry)).await
}

/// DELETE /api/whitelist?uuid=
pub async fn whitelist_remove(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<UuidQuery>,
) -> ApiResult {
    let uuid = require_uuid(query.uuid.as_deref())?;
    submit(&state, HostCommand::WhitelistRemove { uuid }).await
}

/// GET /api/blacklist
pub async fn blacklist(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "blacklist": state.host.banned() })))
}

pub async fn blacklist_add(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<ListEntryBody>,
) -> ApiResult {
    let entry = list_entry(request)?;
    submit(&state, HostCommand::BanAdd(entry)).await
}

pub async fn blacklist_remove(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<UuidQuery>,
) -> ApiResult {
    let uuid = require_uuid(query.uuid.as_deref())?;
    submit(&state, HostCommand::BanRemove { uuid }).await
}

/// GET /api/ops
pub async fn ops(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "ops": state.host.operators() })))
}

pub async fn ops_add(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<ListEntryBody>,
) -> ApiResult {
    let entry = list_entry(request)?;
    submit(&state, HostCommand::OpAdd(entry)).await
}

pub async fn ops_remove(
    State(state): State<Arc<ControlState>>,
    ApiQuery(query): ApiQuery<UuidQuery>,
) -> ApiResult {
    let uuid = require_uuid(query.uuid.as_deref())?;
    submit(&state, HostCommand::OpRemove { uuid }).await
}

// ---------------------------------------------------------------------------
// Server info, logs, console
// ---------------------------------------------------------------------------

pub async fn plugins(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "plugins": state.host.plugins() })))
}

pub async fn server(State(state): State<Arc<ControlState>>) -> ApiResult {
    success_with(&state.host.server_info())
}

pub async fn console(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "logs": state.logs.console_lines() })))
}

pub async fn chat(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "logs": state.logs.chat_lines() })))
}

/// POST /api/chat  `{message}`
pub async fn send_chat(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<ChatBody>,
) -> ApiResult {
    let message = required("message", request.message)?;
    submit(&state, HostCommand::Chat { message }).await
}

/// POST /api/command  `{command}`
pub async fn command(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<CommandBody>,
) -> ApiResult {
    let command = required("command", request.command)?;
    info!(command = %command, "console command requested");
    submit(&state, HostCommand::Console { command }).await
}

/// GET /api/logs
pub async fn logs(State(state): State<Arc<ControlState>>) -> ApiResult {
    let lines = state.logs.combined_lines();
    Ok(success(json!({
        "count": lines.len(),
        "logs": lines,
    })))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub async fn settings(State(state): State<Arc<ControlState>>) -> ApiResult {
    let settings = state.host.settings();
    Ok(success(json!({
        "properties": settings.properties,
        "gamerules": settings.gamerules,
    })))
}

/// POST /api/settings  `{properties?, gamerules?}`; at least one is required.
pub async fn update_settings(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<SettingsBody>,
) -> ApiResult {
    if request.properties.is_none() && request.gamerules.is_none() {
        return Err(ApiError(ControlError::Invalid(
            "properties or gamerules is required".into(),
        )));
    }
    if let Some(properties) = request.properties {
        state
            .queue
            .submit(HostCommand::UpdateProperties(to_btree(properties)))
            .await?;
    }
    if let Some(gamerules) = request.gamerules {
        state
            .queue
            .submit(HostCommand::UpdateGameRules(to_btree(gamerules)))
            .await?;
    }
    Ok(accepted())
}

pub async fn properties(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "properties": state.host.settings().properties })))
}

/// POST /api/settings/properties  `{properties: {...}}`
pub async fn update_properties(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<SettingsBody>,
) -> ApiResult {
    let properties = request
        .properties
        .ok_or_else(|| ApiError(ControlError::Invalid("properties is required".into())))?;
    submit(&state, HostCommand::UpdateProperties(to_btree(properties))).await
}

pub async fn gamerules(State(state): State<Arc<ControlState>>) -> ApiResult {
    Ok(success(json!({ "gamerules": state.host.settings().gamerules })))
}

/// POST /api/settings/gamerules  `{gamerules: {...}}`
pub async fn update_gamerules(
    State(state): State<Arc<ControlState>>,
    ApiBody(request): ApiBody<SettingsBody>,
) -> ApiResult {
    let gamerules = request
        .gamerules
        .ok_or_else(|| ApiError(ControlError::Invalid("gamerules is required".into())))?;
    submit(&state, HostCommand::UpdateGameRules(to_btree(gamerules))).await
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

/// POST /api/restart: queue a shutdown after the configured delay.
pub async fn restart(State(state): State<Arc<ControlState>>) -> ApiResult {
    let delay = state.restart_delay();
    let queue = state.queue.clone();
    warn!(delay_ms = delay.as_millis() as u64, "server restart requested");

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = queue.submit(HostCommand::Shutdown).await {
            warn!(error = %e, "restart could not be delivered");
        }
    });

    Ok(success(json!({ "message": "Server restart initiated" })))
}
