//! API integration tests

use std::{net::SocketAddr, time::Duration};

use library_api::{
    app::create_router,
    config::AppConfig,
    database::{ConnectOptions, Connector},
    AppState,
};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};

/// Boot the server on an ephemeral port and return its base URL
async fn spawn_server(config: AppConfig, connector: Connector) -> String {
    let app = create_router(AppState::new(config, connector)).expect("Failed to build router");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    format!("http://{}", addr)
}

async fn offline_server(config: AppConfig) -> String {
    spawn_server(config, Connector::new(ConnectOptions::default())).await
}

#[tokio::test]
async fn test_health_check() {
    let base = offline_server(AppConfig::default()).await;

    let response = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert_eq!(body["environment"], "development");
}

#[tokio::test]
async fn test_welcome() {
    let base = offline_server(AppConfig::default()).await;

    let body: Value = Client::new()
        .get(&base)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(body["message"], "Library Management API - Welcome!");
    assert_eq!(body["endpoints"]["books"], "/api/books");
}

#[tokio::test]
async fn test_unknown_route() {
    let base = offline_server(AppConfig::default()).await;

    let response = Client::new()
        .delete(format!("{}/api/unknown", base))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body,
        json!({
            "success": false,
            "message": "Route not found",
            "error": "Cannot DELETE /api/unknown"
        })
    );
}

#[tokio::test]
async fn test_unreachable_store_keeps_service_up() {
    let connector = Connector::new(ConnectOptions {
        server_selection_timeout: Duration::from_millis(200),
        heartbeat_interval: Duration::ZERO,
        ..ConnectOptions::default()
    });
    assert!(connector.connect("mongodb://127.0.0.1:1").await.is_err());

    let base = spawn_server(AppConfig::default(), connector).await;
    let client = Client::new();

    let health = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(health.status(), StatusCode::OK);

    let books = client
        .get(format!("{}/api/books", base))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(books.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = books.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rate_limit() {
    let mut config = AppConfig::default();
    config.rate_limit.window_secs = 60;
    config.rate_limit.max_requests = 3;
    let base = offline_server(config).await;
    let client = Client::new();

    for _ in 0..3 {
        let response = client
            .get(format!("{}/health", base))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_production_cors() {
    let mut config = AppConfig::default();
    config.server.environment = "production".into();
    let base = offline_server(config).await;
    let client = Client::new();

    let allowed = client
        .get(format!("{}/health", base))
        .header(header::ORIGIN, "https://vercel.app")
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(
        allowed
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://vercel.app"
    );

    for origin in ["https://example.org", "https://catalog.vercel.app"] {
        let denied = client
            .get(format!("{}/health", base))
            .header(header::ORIGIN, origin)
            .send()
            .await
            .expect("Failed to send request");
        assert!(denied
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}

#[tokio::test]
#[ignore] // Run with: MONGODB_URI=mongodb://localhost:27017/library_test cargo test -- --ignored
async fn test_book_lifecycle() {
    let uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let connector = Connector::new(ConnectOptions::default());
    connector.connect(&uri).await.expect("Failed to connect");

    let base = spawn_server(AppConfig::default(), connector).await;
    let client = Client::new();
    let isbn = format!("978{}", chrono::Utc::now().timestamp_millis());

    let created = client
        .post(format!("{}/api/books", base))
        .json(&json!({
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "genre": "FICTION",
            "isbn": isbn,
            "copies": 2
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Value = created.json().await.expect("Failed to parse response");
    let id = created["data"]["_id"].as_str().unwrap().to_string();

    let borrowed = client
        .post(format!("{}/api/borrow", base))
        .form(&[
            ("book", id.as_str()),
            ("quantity", "2"),
            ("dueDate", "2030-01-01T00:00:00Z"),
        ])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(borrowed.status(), StatusCode::CREATED);

    let book: Value = client
        .get(format!("{}/api/books/{}", base, id))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["data"]["copies"], 0);
    assert_eq!(book["data"]["available"], false);

    let again = client
        .post(format!("{}/api/borrow", base))
        .json(&json!({ "book": id, "quantity": 1, "dueDate": "2030-01-01T00:00:00Z" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let deleted = client
        .delete(format!("{}/api/books/{}", base, id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(deleted.status(), StatusCode::OK);
}
