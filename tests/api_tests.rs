use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use fleetd::config::Config;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-password";

fn test_config() -> Config {
    let db_path = std::env::temp_dir().join(format!("fleetd-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}?mode=rwc", db_path.display());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.security.bootstrap_admin_password = Some(ADMIN_PASSWORD.to_string());
    config.observability.metrics_enabled = false;
    config
}

async fn spawn_app() -> Router {
    let state = fleetd::api::create_app_state_from_config(test_config(), None)
        .await
        .expect("Failed to create app state");
    fleetd::api::router(state).await
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn register(app: &Router, name: &str, inventory: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/hosts",
        None,
        Some(json!({
            "name": name,
            "ip_address": "10.0.0.1",
            "cpu_cores": 4,
            "ram": "8GB",
            "os": "Debian 12",
            "monokit_version": "1.0.0",
            "inventory": inventory,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["data"]["api_key"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], true);
}

#[tokio::test]
async fn test_protected_routes_require_credentials() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/api/v1/hosts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, "GET", "/api/v1/hosts", Some("Bearer nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_me_and_logout() {
    let app = spawn_app().await;
    let token = login(&app, "admin", ADMIN_PASSWORD).await;

    // Raw and Bearer-prefixed forms resolve to the same session.
    for header in [token.clone(), format!("Bearer {token}")] {
        let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&header), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["username"], "admin");
        assert_eq!(body["data"]["role"], "admin");
    }

    let bearer = format!("Bearer {token}");
    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&bearer), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_host_registration_protocol() {
    let app = spawn_app().await;
    let key = register(&app, "web-01", "default").await;
    assert_eq!(key.len(), 64);

    let report = json!({ "name": "web-01", "os": "Debian 13" });

    let (status, _) = send(&app, "POST", "/api/v1/hosts", None, Some(report.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/hosts",
        Some("Bearer not-the-key"),
        Some(report.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let bearer = format!("Bearer {key}");
    let (status, body) = send(&app, "POST", "/api/v1/hosts", Some(&bearer), Some(report)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["host"]["os"], "Debian 13");
    assert_eq!(body["data"]["host"]["status"], "Online");
    assert!(body["data"].get("api_key").is_none());
}

#[tokio::test]
async fn test_host_principal_is_confined_to_itself() {
    let app = spawn_app().await;
    let key = register(&app, "db-01", "default").await;
    register(&app, "db-02", "default").await;

    let (status, _) = send(&app, "GET", "/api/v1/hosts", Some(&key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/v1/hosts/db-01/config", Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "db-01");

    let (status, _) = send(&app, "GET", "/api/v1/hosts/db-02/config", Some(&key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/hosts/db-01/logs",
        Some(&key),
        Some(json!({ "level": "ERROR", "component": "mysql", "message": "replication lag" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["level"], "error");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/hosts/db-02/logs",
        Some(&key),
        Some(json!({ "message": "spoofed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_listing_is_scoped_by_inventory() {
    let app = spawn_app().await;
    let admin = format!("Bearer {}", login(&app, "admin", ADMIN_PASSWORD).await);

    register(&app, "prod-01", "prod").await;
    register(&app, "lab-01", "default").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/admin/users",
        Some(&admin),
        Some(json!({
            "username": "alice",
            "password": "alice-password",
            "inventories": ["prod"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let alice = login(&app, "alice", "alice-password").await;

    let (status, body) = send(&app, "GET", "/api/v1/hosts", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["prod-01"]);

    let (status, _) = send(&app, "GET", "/api/v1/hosts/lab-01", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/api/v1/hosts", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/api/v1/inventories", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "prod");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Operators cannot perform admin-only actions, even in scope.
    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/hosts/prod-01/deletion",
        Some(&alice),
        Some(json!({ "up_for_deletion": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/inventories",
        Some(&alice),
        Some(json!({ "name": "staging" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_group_scope_gates_component_toggles() {
    let app = spawn_app().await;
    let admin = format!("Bearer {}", login(&app, "admin", ADMIN_PASSWORD).await);
    register(&app, "app-01", "default").await;

    send(
        &app,
        "POST",
        "/api/v1/admin/users",
        Some(&admin),
        Some(json!({ "username": "bob", "password": "bob-password" })),
    )
    .await;
    let bob = login(&app, "bob", "bob-password").await;

    // Neither side has groups yet, so the nil sentinel matches.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/hosts/app-01/components/nginx/disable",
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["disabled_components"], "nginx");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/groups",
        Some(&admin),
        Some(json!({ "name": "web" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "POST", "/api/v1/groups/web/hosts/app-01", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/hosts/app-01/components/nginx/enable",
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/api/v1/groups/web/users/bob", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/hosts/app-01/components/nginx/enable",
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["disabled_components"], "nil");
}

#[tokio::test]
async fn test_inventory_deletion_rules() {
    let app = spawn_app().await;
    let admin = format!("Bearer {}", login(&app, "admin", ADMIN_PASSWORD).await);
    register(&app, "edge-01", "edge").await;

    let (status, _) = send(&app, "DELETE", "/api/v1/inventories/default", Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "DELETE", "/api/v1/inventories/edge", Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "DELETE", "/api/v1/hosts/edge-01", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/api/v1/inventories/edge", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_log_listing_is_paginated_newest_first() {
    let app = spawn_app().await;
    let admin = format!("Bearer {}", login(&app, "admin", ADMIN_PASSWORD).await);
    let key = register(&app, "cache-01", "default").await;

    for i in 0..3 {
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/hosts/cache-01/logs",
            Some(&key),
            Some(json!({
                "level": if i == 1 { "warn" } else { "info" },
                "message": format!("line {i}"),
                "timestamp": format!("2026-01-0{}T00:00:00Z", i + 1),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/hosts/cache-01/logs?page=1&page_size=2",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["logs"][0]["message"], "line 2");

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/hosts/cache-01/logs?level=WARN",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["logs"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["logs"][0]["message"], "line 1");
}

#[tokio::test]
async fn test_jobs_unavailable_without_awx() {
    let app = spawn_app().await;
    let admin = format!("Bearer {}", login(&app, "admin", ADMIN_PASSWORD).await);
    register(&app, "job-01", "default").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/jobs",
        Some(&admin),
        Some(json!({ "template_id": 12, "host": "job-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
