//! HTTP tests for the challenge service on the emulated device.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use kbot_harness::{Backend, HarnessConfig};
use kbot_serve::server::build_router;
use kbot_serve::AppState;

const ADD_SRC: &str =
    "extern \"C\" __global__ void elementwise_add(float* out, const float* a, const float* b) { }";
const ZEROS_SRC: &str = "extern \"C\" __global__ void fill_zeros(float* out) { }";

fn app() -> Router {
    let config = HarnessConfig { seed: Some(3), ..Default::default() };
    build_router(AppState::new(Backend::emulator(config)))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

fn create_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "vector add",
        "creator": "admin",
        "kernel_type": "CUDA",
        "kernel_name": "elementwise_add",
        "source": ADD_SRC,
        "input_shapes": "[(16,), (16,)]",
        "output_shape": "(16,)",
        "global_size": "(1, 1, 1)",
        "local_size": "(16, 1, 1)",
        "dtype": "single",
        "distribution": "randn",
        "num_tests": 3
    })
}

fn submit_body(user: &str, source: &str, kernel_name: &str) -> Value {
    json!({
        "user": user,
        "kernel_type": "cuda",
        "kernel_name": kernel_name,
        "source": source,
        "global_size": "(1, 1, 1)",
        "local_size": "(16, 1, 1)"
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "emulator");
}

#[tokio::test]
async fn test_create_and_list() {
    let app = app();
    let (status, body) = call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tests"], 3);
    assert_eq!(body["ops"], 16);
    assert_eq!(body["input_shapes"], json!(["(16,)", "(16,)"]));

    let (status, body) = call(&app, Method::GET, "/v1/challenges", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    let (status, body) = call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_challenge");
}

#[tokio::test]
async fn test_bad_literal_is_unprocessable() {
    let mut body = create_body("add");
    body["input_shapes"] = json!("[(16), (16,)]");
    let (status, body) = call(&app(), Method::POST, "/v1/challenges", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_zero_tests_rejected() {
    let mut body = create_body("add");
    body["num_tests"] = json!(0);
    let (status, body) = call(&app(), Method::POST, "/v1/challenges", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_argument");
}

#[tokio::test]
async fn test_oversized_suite_is_unprocessable() {
    let app = app();
    for shapes in ["[(1048576, 1048576, 1024)]", "[(9223372036854775807, 3)]"] {
        let mut body = create_body("huge");
        body["input_shapes"] = json!(shapes);
        let (status, body) = call(&app, Method::POST, "/v1/challenges", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_argument");
    }
    let (_, body) = call(&app, Method::GET, "/v1/challenges", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_unsupported_kernel_type() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    let mut body = submit_body("u1", ADD_SRC, "elementwise_add");
    body["kernel_type"] = json!("torch");
    let (status, body) = call(&app, Method::POST, "/v1/challenges/add/submissions", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unsupported_kernel_type");
}

#[tokio::test]
async fn test_submit_and_leaderboard() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/challenges/add/submissions",
        Some(submit_body("alice", ADD_SRC, "elementwise_add")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["standing"], "first");
    assert_eq!(body["rank"], 1);
    assert_eq!(body["cases"], 3);

    let (status, body) = call(&app, Method::GET, "/v1/challenges/add/leaderboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body["text"].as_str().unwrap_or_default();
    assert!(text.starts_with("# Challenge: `add`"));
    assert!(text.contains("`elementwise_add (CUDA)`"));
    assert!(text.contains("by alice"));

    call(
        &app,
        Method::POST,
        "/v1/challenges/add/submissions",
        Some(submit_body("bob", ADD_SRC, "elementwise_add")),
    )
    .await;
    let (_, body) = call(&app, Method::GET, "/v1/challenges/add/leaderboard", None).await;
    assert_eq!(body["entries"].as_array().map(Vec::len), Some(2));
    assert!(body["text"].as_str().unwrap_or_default().contains("by bob"));
}

#[tokio::test]
async fn test_wrong_answer_is_not_recorded() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/challenges/add/submissions",
        Some(submit_body("mallory", ZEROS_SRC, "fill_zeros")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "correctness_error");
    assert!(body["message"].as_str().unwrap_or_default().contains("test case 0"));

    let (_, body) = call(&app, Method::GET, "/v1/challenges/add/leaderboard", None).await;
    assert_eq!(body["entries"], json!([]));
}

#[tokio::test]
async fn test_compile_error_reports_log() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    let src = format!("#error vectorized path not implemented\n{ADD_SRC}");
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/challenges/add/submissions",
        Some(submit_body("u", &src, "elementwise_add")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "compile_error");
    assert!(body["message"].as_str().unwrap_or_default().contains("vectorized path not implemented"));
}

#[tokio::test]
async fn test_unknown_challenge_is_not_found() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/challenges/nope/submissions",
        Some(submit_body("u", ADD_SRC, "elementwise_add")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::GET, "/v1/challenges/nope/leaderboard", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::DELETE, "/v1/challenges/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_and_export() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    for _ in 0..2 {
        call(
            &app,
            Method::POST,
            "/v1/challenges/add/submissions",
            Some(submit_body("carol", ADD_SRC, "elementwise_add")),
        )
        .await;
    }

    let (status, body) = call(&app, Method::GET, "/v1/challenges/add/users/carol/submissions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().map(Vec::len), Some(2));
    assert!(body["text"].as_str().unwrap_or_default().contains("🏆"));

    let (status, body) = call(&app, Method::GET, "/v1/export", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["best_submissions"].as_array().cloned().unwrap_or_default();
    assert!(rows.len() <= 1);
    assert!(rows.iter().all(|r| r["user"] == "carol"));
    assert_eq!(body["challenges"][0]["name"], "add");
}

#[tokio::test]
async fn test_delete_user_and_challenge() {
    let app = app();
    call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    call(
        &app,
        Method::POST,
        "/v1/challenges/add/submissions",
        Some(submit_body("dave", ADD_SRC, "elementwise_add")),
    )
    .await;

    let (status, body) = call(&app, Method::DELETE, "/v1/users/dave", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["submissions_removed"], 1);

    let (status, _) = call(&app, Method::DELETE, "/v1/users/dave", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::DELETE, "/v1/challenges/add", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["challenge"], "add");

    let (_, body) = call(&app, Method::GET, "/v1/challenges", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_out_of_memory_is_retryable() {
    let config = HarnessConfig { emulator_capacity: 128, ..Default::default() };
    let app = build_router(AppState::new(Backend::emulator(config)));
    let (status, body) = call(&app, Method::POST, "/v1/challenges", Some(create_body("add"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "resource_exhausted");
    assert_eq!(body["retryable"], true);

    let (_, body) = call(&app, Method::GET, "/v1/challenges", None).await;
    assert_eq!(body, json!([]));
}
