//! wiremock stand-in for the provider API

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount a token endpoint answering every grant
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-live",
            "refresh_token": "ref-live",
            "expires_in": "86400"
        })))
        .mount(server)
        .await;
}

/// Mount the task list of `group`
pub async fn mount_tasks(server: &MockServer, group: &str, tasks: &[(&str, &str)]) {
    let data: Vec<Value> = tasks
        .iter()
        .map(|(id, name)| json!({"taskId": id, "taskName": name}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/Task"))
        .and(query_param("taskGroupId", group))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": data })))
        .mount(server)
        .await;
}

/// Mount clear and start endpoints accepting any task
pub async fn mount_task_control(server: &MockServer) {
    for endpoint in ["RemoveDataByTaskId", "StartTask"] {
        Mock::given(method("POST"))
            .and(path(format!("/api/task/{endpoint}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(server)
            .await;
    }
}

/// Status response body for `(task, status)` pairs
pub fn statuses(entries: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = entries
        .iter()
        .map(|(id, status)| json!({"taskId": id, "status": status}))
        .collect();
    json!({ "data": data })
}

/// Mount one data page of `task` at `offset`
pub async fn mount_page(server: &MockServer, task: &str, offset: usize, rows: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/alldata/GetDataOfTaskByOffset"))
        .and(query_param("taskId", task))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"dataList": rows}
        })))
        .mount(server)
        .await;
}

/// A job posting row
pub fn job(title: &str, company: &str) -> Value {
    json!({
        "title": title,
        "company": company,
        "jobUrl": format!("https://jobs.example/{}", title.to_lowercase().replace(' ', "-")),
    })
}
