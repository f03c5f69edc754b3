//! HTTP endpoint tests against an in-memory SQLite database (tower test
//! utilities, no server needed).

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use axum_table_gateway::TableGatewayLayer;
use serde_json::{json, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tower::ServiceExt;

async fn create_test_pool() -> SqlitePool {
    // One connection, so every query sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER,
            status TEXT DEFAULT 'admitted'
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(r#"CREATE TABLE shifts (id INTEGER PRIMARY KEY, "table" TEXT, "limit" INTEGER)"#)
        .execute(&pool)
        .await
        .unwrap();

    pool
}

async fn create_test_app() -> (Router, SqlitePool) {
    let pool = create_test_pool().await;
    let app = TableGatewayLayer::sqlite("/api/db", pool.clone())
        .with_default_table("patients")
        .into_router();
    (app, pool)
}

async fn send_json_request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!({}));
    (status, json)
}

async fn insert_patient(app: &Router, name: &str, age: i64, status: &str) -> Value {
    let (code, row) = send_json_request(
        app,
        "POST",
        "/api/db",
        Some(json!({"table": "patients", "data": {"name": name, "age": age, "status": status}})),
    )
    .await;
    assert_eq!(code, StatusCode::OK, "insert failed: {row}");
    row
}

// Insert

#[tokio::test]
async fn test_insert_returns_inserted_row() {
    let (app, _pool) = create_test_app().await;

    let row = insert_patient(&app, "Alice", 30, "active").await;

    assert_eq!(row, json!({"id": 1, "name": "Alice", "age": 30, "status": "active"}));
}

#[tokio::test]
async fn test_insert_drops_invalid_columns() {
    let (app, _pool) = create_test_app().await;

    let (status, row) = send_json_request(
        &app,
        "POST",
        "/api/db",
        Some(json!({"table": "patients", "data": {"name": "Bob", "age; DROP TABLE patients": 1}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["name"], "Bob");
    assert_eq!(row["age"], Value::Null);
}

#[tokio::test]
async fn test_insert_with_only_invalid_columns_is_rejected() {
    let (app, pool) = create_test_app().await;

    let (status, json) = send_json_request(
        &app,
        "POST",
        "/api/db",
        Some(json!({"table": "patients", "data": {"bad name": "x", "1st": 2}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No valid column names were supplied");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patients")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn test_insert_without_data_is_rejected() {
    let (app, _pool) = create_test_app().await;

    let (status, json) =
        send_json_request(&app, "POST", "/api/db", Some(json!({"table": "patients"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Insert requires at least one field");
    assert_eq!(json["message"], json["error"]);
}

// Select

#[tokio::test]
async fn test_select_all_filter_and_limit() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;
    insert_patient(&app, "Bob", 45, "discharged").await;
    insert_patient(&app, "Carol", 30, "active").await;

    let (status, rows) = send_json_request(&app, "GET", "/api/db?table=patients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 3);

    let (_, rows) =
        send_json_request(&app, "GET", "/api/db?table=patients&status=active", None).await;
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alice", "Carol"]);

    // Query-string values are text; column affinity still matches integers
    let (_, rows) = send_json_request(&app, "GET", "/api/db?table=patients&age=45", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["name"], "Bob");

    let (_, rows) = send_json_request(&app, "GET", "/api/db?table=patients&limit=2", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_select_uses_default_table() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;

    let (status, rows) = send_json_request(&app, "GET", "/api/db", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["name"], "Alice");
}

#[tokio::test]
async fn test_select_drops_invalid_filter_keys() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;
    insert_patient(&app, "Bob", 45, "active").await;

    let (status, rows) = send_json_request(
        &app,
        "GET",
        "/api/db?table=patients&name%20OR%201%3D1=x",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_select_prefixed_filters_on_reserved_names() {
    let (app, pool) = create_test_app().await;
    sqlx::query(r#"INSERT INTO shifts (id, "table", "limit") VALUES (1, 'icu', 3), (2, 'er', 5)"#)
        .execute(&pool)
        .await
        .unwrap();

    let (status, rows) = send_json_request(
        &app,
        "GET",
        "/api/db?table=shifts&f_table=er&f_limit=5",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows, json!([{"id": 2, "table": "er", "limit": 5}]));
}

#[tokio::test]
async fn test_select_rejects_invalid_limit() {
    let (app, _pool) = create_test_app().await;

    for limit in ["0", "-3", "ten"] {
        let (status, json) =
            send_json_request(&app, "GET", &format!("/api/db?limit={limit}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "limit {limit:?}");
        assert!(json["error"].as_str().unwrap().starts_with("Invalid limit"));
    }
}

#[tokio::test]
async fn test_select_with_oversized_limit_returns_every_row() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;
    insert_patient(&app, "Bob", 45, "active").await;

    for limit in [
        "9223372036854775807",
        "9223372036854775808",
        "10000000000000000000",
        "100000000000000000000",
    ] {
        let (status, rows) =
            send_json_request(&app, "GET", &format!("/api/db?limit={limit}"), None).await;
        assert_eq!(status, StatusCode::OK, "limit {limit}: {rows}");
        assert_eq!(rows.as_array().unwrap().len(), 2, "limit {limit}");
    }
}

#[tokio::test]
async fn test_select_from_missing_table_is_a_store_error() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = send_json_request(&app, "GET", "/api/db?table=wards", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("wards"));
}

// Update

#[tokio::test]
async fn test_update_returns_rows_and_count() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;
    insert_patient(&app, "Bob", 45, "active").await;

    let (status, json) = send_json_request(
        &app,
        "PATCH",
        "/api/db",
        Some(json!({
            "table": "patients",
            "data": {"status": "discharged"},
            "filters": {"name": "Bob"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rowsAffected"], 1);
    assert_eq!(
        json["rows"],
        json!([{"id": 2, "name": "Bob", "age": 45, "status": "discharged"}])
    );
}

#[tokio::test]
async fn test_update_without_filters_changes_nothing() {
    let (app, pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;

    for filters in [None, Some(json!({})), Some(json!({"bad column": 1}))] {
        let mut body = json!({"table": "patients", "data": {"status": "discharged"}});
        if let Some(filters) = filters {
            body["filters"] = filters;
        }

        let (status, json) = send_json_request(&app, "PATCH", "/api/db", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Update requires at least one filter to prevent accidental mass updates"
        );
    }

    let (status,): (String,) = sqlx::query_as("SELECT status FROM patients WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "active");
}

#[tokio::test]
async fn test_update_without_data_is_rejected() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = send_json_request(
        &app,
        "PATCH",
        "/api/db",
        Some(json!({"table": "patients", "data": {}, "filters": {"id": 1}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Update requires at least one field");
}

// Delete

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;
    insert_patient(&app, "Bob", 45, "active").await;

    let body = json!({"table": "patients", "filters": {"name": "Alice"}});

    let (status, json) = send_json_request(&app, "DELETE", "/api/db", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rowsAffected"], 1);
    assert_eq!(json["rows"][0]["name"], "Alice");

    let (status, json) = send_json_request(&app, "DELETE", "/api/db", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"rows": [], "rowsAffected": 0}));

    let (_, rows) = send_json_request(&app, "GET", "/api/db", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_uses_query_string_filters_without_body() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;
    insert_patient(&app, "Bob", 45, "active").await;

    let (status, json) =
        send_json_request(&app, "DELETE", "/api/db?table=patients&name=Bob", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rowsAffected"], 1);
    assert_eq!(json["rows"][0]["name"], "Bob");
}

#[tokio::test]
async fn test_delete_without_filters_is_rejected() {
    let (app, _pool) = create_test_app().await;
    insert_patient(&app, "Alice", 30, "active").await;

    let (status, json) = send_json_request(
        &app,
        "DELETE",
        "/api/db",
        Some(json!({"table": "patients", "filters": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "Delete requires at least one filter to prevent accidental mass deletion"
    );

    let (_, rows) = send_json_request(&app, "GET", "/api/db", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

// Injection and malformed input

#[tokio::test]
async fn test_injection_table_name_is_rejected() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = send_json_request(
        &app,
        "DELETE",
        "/api/db",
        Some(json!({"table": "patients; DROP TABLE patients; --", "filters": {"id": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid table name"));

    let (status, _) =
        send_json_request(&app, "GET", "/api/db?table=users%3B%20--", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Table still exists
    let (status, _) = send_json_request(&app, "GET", "/api/db?table=patients", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_values_are_stored_verbatim() {
    let (app, _pool) = create_test_app().await;
    let hostile = "Robert'); DROP TABLE patients;--";

    let row = insert_patient(&app, hostile, 10, "active").await;
    assert_eq!(row["name"], hostile);

    let (_, rows) = send_json_request(&app, "GET", "/api/db", None).await;
    assert_eq!(rows[0]["name"], hostile);
}

#[tokio::test]
async fn test_nested_values_are_rejected() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = send_json_request(
        &app,
        "POST",
        "/api/db",
        Some(json!({"table": "patients", "data": {"name": {"first": "Alice"}}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let (app, _pool) = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/db")
        .header("content-type", "application/json")
        .body(Body::from("{\"table\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// Method routing and health

#[tokio::test]
async fn test_unsupported_method() {
    let (app, _pool) = create_test_app().await;

    let (status, json) = send_json_request(&app, "PUT", "/api/db", Some(json!({}))).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json, json!({"error": "Method not allowed", "message": "Method not allowed"}));
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _pool) = create_test_app().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/db")
        .header("origin", "https://example.com")
        .header("access-control-request-method", "PATCH")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let methods = response.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap();
    assert!(methods.contains("PATCH"));
    assert!(methods.contains("DELETE"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, pool) = create_test_app().await;

    let (status, json) = send_json_request(&app, "GET", "/api/db/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok"}));

    pool.close().await;

    let (status, json) = send_json_request(&app, "GET", "/api/db/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].is_string());
}
