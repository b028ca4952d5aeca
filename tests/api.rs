//! HTTP tests driving the router in-process.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use repobase::config::ServerConfig;
use repobase::hub::Hub;
use repobase::server::{AppState, PRINCIPAL_HEADER, create_router};

struct TestApp {
    _temp_dir: TempDir,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let hub = Hub::open(&config).expect("open hub");
        hub.create_namespace("alice").expect("create alice");
        hub.create_namespace("bob").expect("create bob");

        Self {
            _temp_dir: temp_dir,
            router: create_router(Arc::new(AppState::new(hub))),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: Body,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(PRINCIPAL_HEADER, user);
        }
        let request = builder
            .header("content-type", "application/json")
            .body(body)
            .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, bytes.to_vec())
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        user: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |v| Body::from(v.to_string()));
        let (status, bytes) = self.send(method, uri, Some(user), body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse json")
        };
        (status, value)
    }

    async fn create_sales_repo(&self) {
        let (status, _) = self
            .json(
                Method::POST,
                "/api/v1/alice/repos",
                "alice",
                Some(json!({"name": "sales"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).expect("health json");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["namespaces"], 2);
}

#[tokio::test]
async fn test_missing_principal_is_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app
        .send(Method::GET, "/api/v1/alice/repos", None, Body::empty())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::GET,
            "/api/v1/alice/repos",
            Some("not a name"),
            Body::empty(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repo_lifecycle() {
    let app = TestApp::new();
    app.create_sales_repo().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/repos",
            "alice",
            Some(json!({"name": "sales"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["data"].is_null());

    let (status, body) = app
        .json(Method::GET, "/api/v1/alice/repos", "alice", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "sales");
    assert_eq!(body["data"][0]["owner"], "alice");

    let (status, _) = app
        .json(Method::DELETE, "/api/v1/alice/sales", "alice", None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .json(Method::GET, "/api/v1/alice/sales/tables", "alice", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_pagination() {
    let app = TestApp::new();
    app.create_sales_repo().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/query",
            "alice",
            Some(json!({"q": "CREATE TABLE sales.n (x integer)"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rows"][0][0], "success");
    assert_eq!(body["data"]["paginated"], false);

    app.json(
        Method::POST,
        "/api/v1/alice/sales/query",
        "alice",
        Some(json!({"q": "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 75) INSERT INTO sales.n SELECT x FROM c"})),
    )
    .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/query",
            "alice",
            Some(json!({"q": "select x from sales.n order by x", "page": 2})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["paginated"], true);
    assert_eq!(data["columns"], json!(["x"]));
    assert_eq!(data["rows"].as_array().unwrap().len(), 25);
    assert_eq!(data["rows"][0][0], 51);
    assert_eq!(data["window"]["total_pages"], 2);
    assert_eq!(data["window"]["prev_page"], 1);
    assert!(data["window"]["next_page"].is_null());

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/query",
            "alice",
            Some(json!({"q": "select * from sales.missing"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("no such table"));

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/query",
            "alice",
            Some(json!({"q": "  ;"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_strangers_get_forbidden() {
    let app = TestApp::new();
    app.create_sales_repo().await;

    for (method, uri) in [
        (Method::GET, "/api/v1/alice/repos"),
        (Method::GET, "/api/v1/alice/sales/tables"),
        (Method::GET, "/api/v1/alice/sales/files"),
        (Method::GET, "/api/v1/alice/ghost/cards"),
        (Method::DELETE, "/api/v1/alice/sales"),
    ] {
        let (status, body) = app.json(method, uri, "bob", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["error"], "access denied: missing required privileges");
    }
}

#[tokio::test]
async fn test_upload_import_browse() {
    let app = TestApp::new();
    app.create_sales_repo().await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/v1/alice/sales/files/people.csv",
            Some("alice"),
            Body::from("Name,Age\nada,36\ngrace,85\n"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/files/people.csv/import",
            "alice",
            Some(json!({"delimiter": ",", "quote_character": "\"", "has_header": true})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["table"], "alice.sales.people");
    assert_eq!(body["data"]["rows_loaded"], 2);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/alice/sales/tables/people?page=1",
            "alice",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["columns"], json!(["name", "age"]));
    assert_eq!(body["data"]["rows"][1], json!(["grace", "85"]));

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/files/people.csv/import",
            "alice",
            Some(json!({"quote_character": "\""})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("delimiter"));

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/v1/alice/sales/files/..",
            Some("alice"),
            Body::from("x"),
        )
        .await;
    assert_ne!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_export_and_download() {
    let app = TestApp::new();
    app.create_sales_repo().await;
    app.json(
        Method::POST,
        "/api/v1/alice/sales/query",
        "alice",
        Some(json!({"q": "CREATE TABLE sales.t AS SELECT 1 AS a, 'x' AS b"})),
    )
    .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/tables/t/export",
            "alice",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["path"], "alice/sales/t.csv");

    let (status, bytes) = app
        .send(
            Method::GET,
            "/api/v1/alice/sales/files/t.csv",
            Some("alice"),
            Body::empty(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"a,b\n1,x\n");

    let (status, body) = app
        .json(Method::GET, "/api/v1/alice/sales/files", "alice", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "t.csv");

    let (status, _) = app
        .json(Method::DELETE, "/api/v1/alice/sales/files/t.csv", "alice", None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .json(Method::DELETE, "/api/v1/alice/sales/files/t.csv", "alice", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_collaborators_and_cards() {
    let app = TestApp::new();
    app.create_sales_repo().await;
    app.json(
        Method::POST,
        "/api/v1/alice/sales/query",
        "alice",
        Some(json!({"q": "CREATE TABLE sales.t AS SELECT 1 AS a"})),
    )
    .await;

    let (status, body) = app
        .json(
            Method::PUT,
            "/api/v1/alice/sales/collaborators/bob",
            "alice",
            Some(json!({"privileges": ["select"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["privileges"], json!(["SELECT"]));

    let (status, _) = app
        .json(
            Method::PUT,
            "/api/v1/alice/sales/collaborators/bob",
            "alice",
            Some(json!({"privileges": ["superuser"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::PUT,
            "/api/v1/alice/sales/collaborators/alice",
            "alice",
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/alice/sales/collaborators",
            "alice",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/cards",
            "alice",
            Some(json!({"name": "everything", "query": "select * from sales.t"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/alice/sales/cards/everything",
            "bob",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rows"], json!([[1]]));

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/alice/sales/cards",
            "bob",
            Some(json!({"name": "mine", "query": "select 1"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json(
            Method::DELETE,
            "/api/v1/alice/sales/collaborators/bob",
            "alice",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .json(
            Method::GET,
            "/api/v1/alice/sales/cards/everything",
            "bob",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
