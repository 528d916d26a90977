use super::*;
use wiremock::matchers::{body_json as body_matches, header, query_param};

#[tokio::test]
async fn test_login_reports_expiry_without_token() {
    let server = provider().await;
    let response = send(app_for(&server, ApiTier::Advanced), get_request("/api/v1/login")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let raw = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(!raw.contains("tok-1"));
    assert!(!raw.contains("ref-1"));

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["has_token"], true);
    assert!(body["expires_at"].is_string());
}

#[tokio::test]
async fn test_login_failure_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let response = send(app_for(&server, ApiTier::Advanced), get_request("/api/v1/login")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "auth_failure");
}

#[tokio::test]
async fn test_list_task_groups() {
    let server = provider().await;
    Mock::given(method("GET"))
        .and(path("/api/TaskGroup"))
        .and(header("authorization", "bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"taskGroupId": 5, "taskGroupName": "Jobs"}]
        })))
        .mount(&server)
        .await;

    let response = send(
        app_for(&server, ApiTier::Standard),
        get_request("/api/v1/task-groups"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["taskGroupId"], "5");
    assert_eq!(body[0]["taskGroupName"], "Jobs");
}

#[tokio::test]
async fn test_list_tasks_requires_group() {
    let server = provider().await;
    let response = send(app_for(&server, ApiTier::Advanced), get_request("/api/v1/tasks")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_input");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_tasks_forwards_group() {
    let server = provider().await;
    Mock::given(method("GET"))
        .and(path("/api/Task"))
        .and(query_param("taskGroupId", "77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"taskId": "t1", "taskName": "EU Remote"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = send(
        app_for(&server, ApiTier::Advanced),
        get_request("/api/v1/tasks?taskGroupId=77"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await[0]["taskId"], "t1");
}

#[tokio::test]
async fn test_start_task_on_standard_tier_is_forbidden() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Standard),
        post_empty("/api/v1/task/t1/start"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "capability_denied");
    assert_eq!(body["error"]["details"]["operation"], "StartTask");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_stop_and_clear_task() {
    let server = provider().await;
    for endpoint in ["StartTask", "StopTask", "RemoveDataByTaskId"] {
        Mock::given(method("POST"))
            .and(path(format!("/api/task/{endpoint}")))
            .and(query_param("taskId", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let app = app_for(&server, ApiTier::Advanced);
    for action in ["start", "stop", "clear"] {
        let response = send(app.clone(), post_empty(&format!("/api/v1/task/t1/{action}"))).await;
        assert_eq!(response.status(), StatusCode::OK, "{action}");
        let body = body_json(response).await;
        assert_eq!(body["taskId"], "t1");
        assert_eq!(body["action"], action);
    }
}

#[tokio::test]
async fn test_upstream_client_error_is_forwarded() {
    let server = provider().await;
    Mock::given(method("POST"))
        .and(path("/api/task/RemoveDataByTaskId"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such task"))
        .mount(&server)
        .await;

    let response = send(
        app_for(&server, ApiTier::Standard),
        post_empty("/api/v1/task/missing/clear"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "remote_error");
    assert_eq!(body["error"]["details"]["upstream_status"], 404);
}

#[tokio::test]
async fn test_status_requires_task_list() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Advanced),
        post_json("/api/v1/tasks/status", json!({})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        app_for(&server, ApiTier::Advanced),
        post_json("/api/v1/tasks/status", json!({"taskIdList": "t1"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_status_keeps_request_order_and_fills_unknown() {
    let server = provider().await;
    Mock::given(method("POST"))
        .and(path("/cloudextraction/statuses/v2"))
        .and(body_matches(json!({"taskIds": ["t2", "t1", "t3"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"taskId": "t1", "status": "Finished"},
                {"taskId": "t2", "status": "Running"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = send(
        app_for(&server, ApiTier::Advanced),
        post_json("/api/v1/tasks/status", json!({"taskIdList": ["t2", "t1", "t3"]})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([
            {"taskId": "t2", "status": "Running"},
            {"taskId": "t1", "status": "Finished"},
            {"taskId": "t3", "status": "Unknown"}
        ])
    );
}

#[tokio::test]
async fn test_data_by_offset_defaults() {
    let server = provider().await;
    Mock::given(method("GET"))
        .and(path("/api/alldata/GetDataOfTaskByOffset"))
        .and(query_param("taskId", "t1"))
        .and(query_param("offset", "0"))
        .and(query_param("size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"dataList": [{"title": "Rust Engineer", "company": "Ferris"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = send(
        app_for(&server, ApiTier::Standard),
        get_request("/api/v1/task/t1/data/by-offset"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([{"title": "Rust Engineer", "company": "Ferris"}])
    );
}

#[tokio::test]
async fn test_data_by_offset_rejects_non_numeric_offset() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Standard),
        get_request("/api/v1/task/t1/data/by-offset?offset=abc"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_data_by_offset_rejects_zero_size() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Standard),
        get_request("/api/v1/task/t1/data/by-offset?offset=10&size=0"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_without_store_is_rejected() {
    let server = provider().await;
    let response = send(
        app_for(&server, ApiTier::Standard),
        post_empty("/api/v1/ingest/t1"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_upserts_one_page() {
    let server = provider().await;
    Mock::given(method("GET"))
        .and(path("/api/alldata/GetDataOfTaskByOffset"))
        .and(query_param("offset", "20"))
        .and(query_param("size", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"dataList": [
                {"title": "Rust Engineer", "jobUrl": "https://jobs.example/1"},
                {"companyName": "No Title Co"},
                {"title": "Go Engineer"}
            ]}
        })))
        .mount(&server)
        .await;

    let temp = tempfile::NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(temp.path()).await.unwrap());
    let app = create_router(state_for(
        test_config(&server, ApiTier::Standard),
        Some(db.clone()),
    ));

    let response = send(app, post_empty("/api/v1/ingest/t1?offset=20&size=3")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"received": 3, "upserted": 2, "failed": 1})
    );
    assert_eq!(db.count_jobs().await.unwrap(), 2);
}
