use super::*;
use crate::client::RemoteTaskClient;
use crate::config::{ApiTier, Config, OrchestrationConfig, ProviderConfig, RetryConfig};
use crate::db::Database;
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod tasks;

/// Provider mock with a working token endpoint
async fn provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "refresh_token": "ref-1",
            "expires_in": 86400
        })))
        .mount(&server)
        .await;
    server
}

fn test_config(server: &MockServer, tier: ApiTier) -> Config {
    Config {
        provider: ProviderConfig {
            base_url: server.uri(),
            status_base_url: server.uri(),
            username: Some("alice".into()),
            password: Some("hunter2".into()),
            tier,
            ..Default::default()
        },
        orchestration: OrchestrationConfig {
            poll_interval: Duration::from_millis(10),
            min_poll_interval: Duration::from_millis(1),
            page_size: 50,
            wait_timeout: Some(Duration::from_secs(5)),
            clear_settle_delay: Duration::ZERO,
            max_consecutive_status_failures: 3,
            collect_concurrency: 1,
        },
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

fn state_for(config: Config, db: Option<Arc<Database>>) -> AppState {
    let client = RemoteTaskClient::from_config(&config).unwrap();
    AppState::new(Arc::new(client), db, Arc::new(config))
}

fn app_for(server: &MockServer, tier: ApiTier) -> Router {
    create_router(state_for(test_config(server, tier), None))
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Standard),
        get_request("/api/v1/health"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["tier"], "standard");
    assert_eq!(body["persistence"], false);
}

#[tokio::test]
async fn test_routes_live_under_prefix() {
    let server = provider().await;
    let response = send(app_for(&server, ApiTier::Advanced), get_request("/health")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_endpoint_serves_document() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Advanced),
        get_request("/api/v1/openapi.json"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/api/v1/run-all"].is_object());
}

#[tokio::test]
async fn test_swagger_ui_toggle() {
    let server = provider().await;

    let enabled = send(
        app_for(&server, ApiTier::Advanced),
        get_request("/api-docs/openapi.json"),
    )
    .await;
    assert_eq!(enabled.status(), StatusCode::OK);

    let mut config = test_config(&server, ApiTier::Advanced);
    config.api.swagger_ui = false;
    let disabled = send(
        create_router(state_for(config, None)),
        get_request("/api-docs/openapi.json"),
    )
    .await;
    assert_eq!(disabled.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let server = provider().await;
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = send(app_for(&server, ApiTier::Advanced), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_restricted_origin_list() {
    let server = provider().await;
    let mut config = test_config(&server, ApiTier::Advanced);
    config.api.cors_origins = vec!["http://allowed.example".into()];
    let app = create_router(state_for(config, None));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://other.example")
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_api_key_guards_routes() {
    let server = provider().await;
    let mut config = test_config(&server, ApiTier::Advanced);
    config.api.api_key = Some("k3y".into());
    let app = create_router(state_for(config, None));

    let missing = send(app.clone(), get_request("/api/v1/health")).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("X-Api-Key", "k3y")
        .body(Body::empty())
        .unwrap();
    let allowed = send(app, request).await;
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_server_stops_on_shutdown_signal() {
    let server = provider().await;
    let state = state_for(test_config(&server, ApiTier::Advanced), None);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(serve(listener, state, async move {
        stop_rx.await.ok();
    }));

    let health: Value = reqwest::get(format!("http://{address}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
