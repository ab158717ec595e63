//! End-to-end tests for the control API over the real router.
//!
//! Covers the key exchange, the bearer gate, method and path fallbacks, and
//! the host routes with their accepted-then-applied semantics.

mod common;

use common::{call, harness, harness_with, request, send, API_KEY};
use mccontrol_core::ListEntry;
use mccontrol_host::HostCommand;
use serde_json::json;
use std::time::Duration;

const STEVE: &str = "8667ba71-b85a-4004-af54-457a9734eed7";

// ============================================================================
// Key exchange
// ============================================================================

#[tokio::test]
async fn test_handshake_is_public() {
    let h = harness();
    let (status, body) = send(&h.app, request("GET", "/api/handshake", None, None)).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["algorithm"], "RSA");
    assert_eq!(body["keySize"], 2048);
    assert_eq!(body["publicKey"], h.state.credentials.public_key_base64());
}

#[tokio::test]
async fn test_auth_with_sealed_key_issues_session() {
    let h = harness();
    let (_, offer) = send(&h.app, request("GET", "/api/handshake", None, None)).await;
    let sealed =
        mccontrol_vault::seal_api_key(offer["publicKey"].as_str().unwrap(), API_KEY).unwrap();

    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/api/auth",
            None,
            Some(&json!({ "apiKey": sealed, "sessionId": "panel-1" })),
        ),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["authenticated"], true);
    let session_key = body["sessionKey"].as_str().unwrap();
    // 32 bytes in standard base64.
    assert_eq!(session_key.len(), 44);
    assert!(h.state.sessions.contains("panel-1").unwrap());
    assert_eq!(
        h.state.sessions.get("panel-1").unwrap().unwrap().to_base64(),
        session_key
    );
}

#[tokio::test]
async fn test_auth_distinct_sessions_get_distinct_keys() {
    let h = harness();
    let public_key = h.state.credentials.public_key_base64();

    let mut keys = Vec::new();
    for id in ["a", "b"] {
        let sealed = mccontrol_vault::seal_api_key(&public_key, API_KEY).unwrap();
        let (status, body) = send(
            &h.app,
            request(
                "POST",
                "/api/auth",
                None,
                Some(&json!({ "apiKey": sealed, "sessionId": id })),
            ),
        )
        .await;
        assert_eq!(status, 200);
        keys.push(body["sessionKey"].as_str().unwrap().to_string());
    }
    assert_ne!(keys[0], keys[1]);
    assert_eq!(h.state.sessions.active_sessions().unwrap(), 2);
}

#[tokio::test]
async fn test_auth_wrong_key_rejected_without_session() {
    let h = harness();
    let sealed =
        mccontrol_vault::seal_api_key(&h.state.credentials.public_key_base64(), "not-the-key")
            .unwrap();

    let (status, body) = send(
        &h.app,
        request(
            "POST",
            "/api/auth",
            None,
            Some(&json!({ "apiKey": sealed, "sessionId": "intruder" })),
        ),
    )
    .await;

    assert_eq!(status, 401);
    assert_eq!(body, json!({ "error": "Invalid API key" }));
    assert!(!h.state.sessions.contains("intruder").unwrap());
}

#[tokio::test]
async fn test_auth_garbage_ciphertext_is_unauthorized() {
    let h = harness();
    let (status, _) = send(
        &h.app,
        request(
            "POST",
            "/api/auth",
            None,
            Some(&json!({ "apiKey": "AAAA", "sessionId": "x" })),
        ),
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_auth_missing_fields_is_bad_request() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        request("POST", "/api/auth", None, Some(&json!({ "apiKey": "AAAA" }))),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "sessionId is required");

    let (status, _) = send(&h.app, request("POST", "/api/auth", None, None)).await;
    assert_eq!(status, 400);
}

// ============================================================================
// Gate, 405, 404
// ============================================================================

const PROTECTED: &[(&str, &str)] = &[
    ("GET", "/api/metrics"),
    ("GET", "/api/players"),
    ("GET", "/api/player"),
    ("POST", "/api/player"),
    ("GET", "/api/whitelist"),
    ("POST", "/api/whitelist"),
    ("DELETE", "/api/whitelist"),
    ("GET", "/api/blacklist"),
    ("POST", "/api/blacklist"),
    ("DELETE", "/api/blacklist"),
    ("GET", "/api/ops"),
    ("POST", "/api/ops"),
    ("DELETE", "/api/ops"),
    ("GET", "/api/plugins"),
    ("GET", "/api/server"),
    ("GET", "/api/console"),
    ("GET", "/api/chat"),
    ("POST", "/api/chat"),
    ("POST", "/api/command"),
    ("GET", "/api/logs"),
    ("GET", "/api/settings"),
    ("POST", "/api/settings"),
    ("GET", "/api/settings/properties"),
    ("POST", "/api/settings/properties"),
    ("GET", "/api/settings/gamerules"),
    ("POST", "/api/settings/gamerules"),
    ("POST", "/api/restart"),
    ("GET", "/api/files"),
    ("POST", "/api/files"),
    ("DELETE", "/api/files"),
    ("GET", "/api/files/content"),
    ("POST", "/api/files/content"),
    ("GET", "/api/files/changelog"),
    // Wrong method on a protected route is still a 401 first.
    ("PUT", "/api/players"),
    ("DELETE", "/api/restart"),
];

#[tokio::test]
async fn test_every_protected_route_requires_bearer() {
    let h = harness();
    let body = json!({ "command": "stop", "message": "hi" });

    for (method, uri) in PROTECTED {
        let (status, resp) = send(&h.app, request(method, uri, None, Some(&body))).await;
        assert_eq!(status, 401, "{} {} without token", method, uri);
        assert_eq!(resp, json!({ "error": "Unauthorized" }));

        let (status, _) = send(&h.app, request(method, uri, Some("wrong"), Some(&body))).await;
        assert_eq!(status, 401, "{} {} with wrong token", method, uri);
    }

    // Nothing reached the host.
    assert_eq!(h.state.world.last_applied(), 0);
    assert!(!h.state.world.is_stopping());
}

#[tokio::test]
async fn test_bearer_prefix_is_exact() {
    let h = harness();
    let req = axum::http::Request::builder()
        .uri("/api/players")
        .header("authorization", format!("bearer {}", API_KEY))
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = send(&h.app, req).await;
    assert_eq!(status, 401);

    let req = axum::http::Request::builder()
        .uri("/api/players")
        .header("authorization", API_KEY)
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = send(&h.app, req).await;
    assert_eq!(status, 401);

    let (status, _) = call(&h.app, "GET", "/api/players", None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_wrong_method_is_405_after_auth() {
    let h = harness();
    let (status, body) = call(&h.app, "DELETE", "/api/players", None).await;
    assert_eq!(status, 405);
    assert_eq!(body, json!({ "error": "Method not allowed" }));

    let (status, _) = call(&h.app, "GET", "/api/command", None).await;
    assert_eq!(status, 405);

    let (status, _) = send(&h.app, request("POST", "/api/handshake", None, None)).await;
    assert_eq!(status, 405);
}

#[tokio::test]
async fn test_unknown_path_is_json_404() {
    let h = harness();
    let (status, body) = call(&h.app, "GET", "/api/nope", None).await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "error": "Not found" }));

    let (status, _) = send(&h.app, request("GET", "/elsewhere", None, None)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_cors_header_present() {
    let h = harness();
    let req = axum::http::Request::builder()
        .uri("/api/handshake")
        .header("origin", "http://panel.example")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = tower::ServiceExt::oneshot(h.app.clone(), req).await.unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
}

// ============================================================================
// Players and lists
// ============================================================================

#[tokio::test]
async fn test_player_uuid_validation() {
    let h = harness();

    let (status, body) = call(&h.app, "GET", "/api/player", None).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "UUID parameter required");

    let (status, body) = call(&h.app, "GET", "/api/player?uuid=steve", None).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid UUID");

    let (status, body) = call(&h.app, "GET", &format!("/api/player?uuid={}", STEVE), None).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Player not found");

    let (status, _) = call(&h.app, "DELETE", "/api/whitelist?uuid=", None).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_malformed_uuid_query_is_json_400() {
    let h = harness();
    let uri = format!("/api/player?uuid={}&uuid={}", STEVE, STEVE);
    let (status, body) = call(&h.app, "GET", &uri, None).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("duplicate field"));

    let uri = format!("/api/ops?uuid={}&uuid=x", STEVE);
    let (status, body) = call(&h.app, "DELETE", &uri, None).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
    assert_eq!(h.state.world.last_applied(), 0);
}

#[tokio::test]
async fn test_player_join_and_kick() {
    let h = harness();
    h.state
        .queue
        .submit(HostCommand::PlayerJoined(ListEntry {
            name: "Steve".into(),
            uuid: STEVE.into(),
        }))
        .await
        .unwrap();
    h.applied(1).await;

    let (status, body) = call(&h.app, "GET", &format!("/api/player?uuid={}", STEVE), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["name"], "Steve");
    assert_eq!(body["online"], true);

    let (_, body) = call(&h.app, "GET", "/api/players", None).await;
    assert_eq!(body["players"].as_array().unwrap().len(), 1);

    let (status, body) = call(
        &h.app,
        "POST",
        &format!("/api/player?uuid={}", STEVE),
        Some(json!({ "action": "kick" })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["accepted"], true);
    h.applied(2).await;

    let (_, body) = call(&h.app, "GET", &format!("/api/player?uuid={}", STEVE), None).await;
    assert_eq!(body["online"], false);

    let (_, chat) = call(&h.app, "GET", "/api/chat", None).await;
    let lines: Vec<&str> = chat["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l.as_str().unwrap())
        .collect();
    assert!(lines.contains(&"[+] Steve joined the server"));
    assert!(lines.contains(&"[-] Steve left the server"));
}

#[tokio::test]
async fn test_player_unknown_action_rejected() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        &format!("/api/player?uuid={}", STEVE),
        Some(json!({ "action": "smite" })),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("smite"));
    assert_eq!(h.state.world.last_applied(), 0);
}

#[tokio::test]
async fn test_whitelist_add_and_remove() {
    let h = harness();
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/whitelist",
        Some(json!({ "name": "Steve", "uuid": STEVE })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "success": true, "accepted": true }));
    h.applied(1).await;

    let (_, body) = call(&h.app, "GET", "/api/whitelist", None).await;
    assert_eq!(body["whitelist"], json!([{ "name": "Steve", "uuid": STEVE }]));
    assert_eq!(body["enabled"], false);

    let (status, _) = call(
        &h.app,
        "DELETE",
        &format!("/api/whitelist?uuid={}", STEVE),
        None,
    )
    .await;
    assert_eq!(status, 200);
    h.applied(2).await;

    let (_, body) = call(&h.app, "GET", "/api/whitelist", None).await;
    assert_eq!(body["whitelist"], json!([]));
}

#[tokio::test]
async fn test_blacklist_and_ops() {
    let h = harness();
    call(
        &h.app,
        "POST",
        "/api/blacklist",
        Some(json!({ "name": "Griefer", "uuid": STEVE })),
    )
    .await;
    call(
        &h.app,
        "POST",
        "/api/ops",
        Some(json!({ "name": "Griefer", "uuid": STEVE })),
    )
    .await;
    h.applied(2).await;

    let (_, body) = call(&h.app, "GET", "/api/blacklist", None).await;
    assert_eq!(body["blacklist"][0]["name"], "Griefer");
    let (_, body) = call(&h.app, "GET", "/api/ops", None).await;
    assert_eq!(body["ops"][0]["uuid"], STEVE);

    let (status, body) = call(&h.app, "POST", "/api/ops", Some(json!({ "name": "x" }))).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "UUID parameter required");
}

// ============================================================================
// Console, chat, command, logs
// ============================================================================

#[tokio::test]
async fn test_command_and_chat() {
    let h = harness();
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/command",
        Some(json!({ "command": "say maintenance at noon" })),
    )
    .await;
    assert_eq!(status, 200);
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/chat",
        Some(json!({ "message": "hello" })),
    )
    .await;
    assert_eq!(status, 200);
    h.applied(2).await;

    let (_, chat) = call(&h.app, "GET", "/api/chat", None).await;
    assert_eq!(
        chat["logs"],
        json!(["[Server] maintenance at noon", "[Server] hello"])
    );

    let (_, console) = call(&h.app, "GET", "/api/console", None).await;
    assert!(console["logs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l.as_str().unwrap().contains("/say maintenance at noon")));

    let (_, logs) = call(&h.app, "GET", "/api/logs", None).await;
    let count = logs["count"].as_u64().unwrap();
    assert_eq!(count as usize, logs["logs"].as_array().unwrap().len());
    assert!(count >= 3);
}

#[tokio::test]
async fn test_empty_command_and_message_rejected() {
    let h = harness();
    let (status, body) = call(&h.app, "POST", "/api/command", Some(json!({ "command": "" }))).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "command is required");

    let (status, body) = call(&h.app, "POST", "/api/chat", Some(json!({}))).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "message is required");

    let (status, _) = call(&h.app, "POST", "/api/chat", Some(json!("just a string"))).await;
    assert_eq!(status, 400);
}

// ============================================================================
// Server, plugins, settings, metrics
// ============================================================================

#[tokio::test]
async fn test_server_and_plugins() {
    let h = harness();
    let (status, body) = call(&h.app, "GET", "/api/server", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["maxPlayers"], 20);
    assert_eq!(body["currentPlayers"], 0);
    assert_eq!(body["worlds"].as_array().unwrap().len(), 3);

    let (_, body) = call(&h.app, "GET", "/api/plugins", None).await;
    assert_eq!(body["plugins"][0]["name"], "MCControl");
}

#[tokio::test]
async fn test_settings_update() {
    let h = harness();
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/settings/gamerules",
        Some(json!({ "gamerules": { "keepInventory": "true", "randomTickSpeed": 7 } })),
    )
    .await;
    assert_eq!(status, 200);
    let (status, _) = call(
        &h.app,
        "POST",
        "/api/settings/properties",
        Some(json!({ "properties": { "motd": "Welcome back" } })),
    )
    .await;
    assert_eq!(status, 200);
    h.applied(2).await;

    let (_, body) = call(&h.app, "GET", "/api/settings/gamerules", None).await;
    assert_eq!(body["gamerules"]["keepInventory"], "true");
    assert_eq!(body["gamerules"]["randomTickSpeed"], "7");

    let (_, body) = call(&h.app, "GET", "/api/settings", None).await;
    assert_eq!(body["properties"]["motd"], "Welcome back");
    assert!(body["gamerules"].is_object());

    let (_, body) = call(&h.app, "GET", "/api/server", None).await;
    assert_eq!(body["motd"], "Welcome back");
}

#[tokio::test]
async fn test_settings_requires_a_section() {
    let h = harness();
    let (status, _) = call(&h.app, "POST", "/api/settings", Some(json!({}))).await;
    assert_eq!(status, 400);

    let (status, body) = call(
        &h.app,
        "POST",
        "/api/settings/properties",
        Some(json!({ "gamerules": {} })),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "properties is required");

    let (status, _) = call(
        &h.app,
        "POST",
        "/api/settings",
        Some(json!({ "properties": { "pvp": false }, "gamerules": { "doFireTick": false } })),
    )
    .await;
    assert_eq!(status, 200);
    h.applied(2).await;
    let (_, body) = call(&h.app, "GET", "/api/settings", None).await;
    assert_eq!(body["properties"]["pvp"], false);
    assert_eq!(body["gamerules"]["doFireTick"], "false");
}

#[tokio::test]
async fn test_metrics_series() {
    let h = harness();
    let (_, body) = call(&h.app, "GET", "/api/metrics", None).await;
    assert_eq!(body["count"], 0);

    h.state.metrics.sample(0);
    h.state.metrics.sample(1);
    let (status, body) = call(&h.app, "GET", "/api/metrics", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 2);
    assert_eq!(body["metrics"][1]["players"], 1);
    assert_eq!(body["metrics"][0]["tps"], 20.0);
}

// ============================================================================
// Restart
// ============================================================================

#[tokio::test]
async fn test_restart_stops_host_after_delay() {
    let h = harness_with(|config| config.host.restart_delay_ms = 20);
    let (status, body) = call(&h.app, "POST", "/api/restart", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Server restart initiated");

    tokio::time::timeout(Duration::from_secs(5), h.state.world.wait_stopping())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), h.host)
        .await
        .unwrap()
        .unwrap();

    // Mutations after the host stopped fail as internal errors.
    let (status, body) = call(
        &h.app,
        "POST",
        "/api/command",
        Some(json!({ "command": "list" })),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "error": "Internal server error" }));
}
