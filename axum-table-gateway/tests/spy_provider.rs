//! Statement dispatch tests with a recording provider in place of a database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use axum_table_gateway::{
    ColumnValues, DatabaseError, DatabaseProvider, Error, MutationResult, ScalarValue,
    SqlGateway, Statement, TableGateway, TableGatewayLayer,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Records every statement it is asked to run
#[derive(Clone, Default)]
struct SpyProvider {
    calls: Arc<Mutex<Vec<Statement>>>,
}

impl SpyProvider {
    fn calls(&self) -> Vec<Statement> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, statement: &Statement) {
        self.calls.lock().unwrap().push(statement.clone());
    }
}

#[async_trait]
impl DatabaseProvider for SpyProvider {
    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<Value>, DatabaseError> {
        self.record(statement);
        Ok(vec![json!({"id": 1, "name": "Alice"})])
    }

    async fn execute_returning(&self, statement: &Statement) -> Result<MutationResult, DatabaseError> {
        self.record(statement);
        Ok(MutationResult {
            rows: vec![json!({"id": 1, "name": "Alice", "age": 30})],
            rows_affected: 1,
        })
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

fn create_test_app() -> (Router, SpyProvider) {
    let spy = SpyProvider::default();
    let app = TableGatewayLayer::new("/api/db", SqlGateway::new(spy.clone())).into_router();
    (app, spy)
}

async fn send(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(json!({})))
}

#[tokio::test]
async fn test_invalid_table_never_reaches_the_store() {
    let (app, spy) = create_test_app();

    let requests = [
        ("GET", "/api/db?table=users%3B%20--", json!({})),
        ("POST", "/api/db", json!({"table": "users; --", "data": {"name": "x"}})),
        (
            "PATCH",
            "/api/db",
            json!({"table": "users; --", "data": {"name": "x"}, "filters": {"id": 1}}),
        ),
        ("DELETE", "/api/db", json!({"table": "users; --", "filters": {"id": 1}})),
        ("DELETE", "/api/db", json!({"table": "", "filters": {"id": 1}})),
    ];

    for (method, uri, body) in requests {
        let (status, json) = send(&app, method, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert!(json["error"].as_str().unwrap().starts_with("Invalid table name"));
    }

    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn test_missing_filters_never_reach_the_store() {
    let (app, spy) = create_test_app();

    let requests = [
        ("PATCH", json!({"table": "patients", "data": {"name": "x"}})),
        ("PATCH", json!({"table": "patients", "data": {"name": "x"}, "filters": {}})),
        ("PATCH", json!({"table": "patients", "data": {}, "filters": {}})),
        ("DELETE", json!({"table": "patients", "filters": {}})),
        ("DELETE", json!({"table": "patients", "filters": {"not valid": 1}})),
    ];

    for (method, body) in requests {
        let (status, json) = send(&app, method, "/api/db", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("requires at least one filter"));
    }

    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn test_insert_statement_binds_values() {
    let (app, spy) = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/api/db",
        json!({"table": "patients", "data": {"name": "Alice", "age": 30}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"id": 1, "name": "Alice", "age": 30}));

    let calls = spy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].sql(),
        r#"INSERT INTO "patients" ("name", "age") VALUES ($1, $2) RETURNING *"#
    );
    assert_eq!(
        calls[0].arguments(),
        &[ScalarValue::from("Alice"), ScalarValue::Int(30)]
    );
}

#[tokio::test]
async fn test_select_statement_from_query_string() {
    let (app, spy) = create_test_app();

    let (status, json) = send(
        &app,
        "GET",
        "/api/db?table=patients&status=active&limit=5",
        json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([{"id": 1, "name": "Alice"}]));

    let calls = spy.calls();
    assert_eq!(
        calls[0].sql(),
        r#"SELECT * FROM "patients" WHERE "status" = $1 LIMIT 5"#
    );
    assert_eq!(calls[0].arguments(), &[ScalarValue::from("active")]);
}

#[tokio::test]
async fn test_hostile_values_are_only_bound() {
    let (app, spy) = create_test_app();
    let hostile = "x'; DROP TABLE patients; --";

    let (status, _) = send(
        &app,
        "DELETE",
        "/api/db",
        json!({"table": "patients", "filters": {"name": hostile}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let calls = spy.calls();
    assert_eq!(calls[0].sql(), r#"DELETE FROM "patients" WHERE "name" = $1 RETURNING *"#);
    assert!(!calls[0].sql().contains("DROP"));
    assert_eq!(calls[0].arguments(), &[ScalarValue::from(hostile)]);
}

#[tokio::test]
async fn test_gateway_rejects_before_dispatch() {
    let spy = SpyProvider::default();
    let gateway = SqlGateway::new(spy.clone());

    let data: ColumnValues = [("status", "discharged")].into_iter().collect();

    let error = gateway
        .update("patients", &data, &ColumnValues::new())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::MissingFilter(_)));

    let error = gateway
        .select("patients WHERE 1=1", &ColumnValues::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InvalidIdentifier(ref table) if table == "patients WHERE 1=1"));

    assert!(spy.calls().is_empty());

    let filters: ColumnValues = [("id", 1)].into_iter().collect();
    let result = gateway.update("patients", &data, &filters).await.unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(
        spy.calls()[0].sql(),
        r#"UPDATE "patients" SET "status" = $1 WHERE "id" = $2 RETURNING *"#
    );
}
