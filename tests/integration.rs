use std::{fs, path::PathBuf};

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use boson::{Runner, Scenario, ScenarioExecutor};
use serde_json::json;
use tokio::task::JoinHandle;

const TOKEN: &str = "tok-abc";

struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route(
                "/api/login",
                post(|| async move {
                    Json(json!({
                        "token": TOKEN,
                        // 2100-01-01, epoch seconds
                        "expire_time": 4102444800u64
                    }))
                }),
            )
            .route(
                "/api/login-bare",
                post(|| async move { Json(json!({"ok": true})) }),
            )
            .route(
                "/api/profile",
                get(|headers: HeaderMap| async move {
                    let expected = format!("Bearer {TOKEN}");
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some(expected.as_str());
                    if authorized {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "data": {
                                    "user": {
                                        "id": 7,
                                        "name": "admin",
                                        "roles": [
                                            {"id": 1, "name": "admin"},
                                            {"id": 2, "name": "qa"}
                                        ]
                                    }
                                }
                            })),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"error": "unauthorized"})),
                        )
                    }
                }),
            )
            .route(
                "/api/echo-path/*rest",
                get(|Path(rest): Path<String>| async move {
                    Json(json!({"path": format!("/api/echo-path/{rest}")}))
                }),
            )
            .route(
                "/api/items",
                get(|| async move {
                    Json(json!({
                        "data": {
                            "kind": "list",
                            "items": [
                                {"id": 1, "name": "alpha"},
                                {"id": 2, "name": "beta"},
                                {"id": 3, "name": "gamma"}
                            ]
                        }
                    }))
                }),
            );

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });

        let handle = tokio::spawn(async move {
            if let Err(err) = server.await {
                eprintln!("test server error: {err}");
            }
        });
        let base_url = format!("http://{addr}");

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                let _ = handle.await;
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn load_scenario(path: &str, base_url: &str) -> Scenario {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let scenario_path = manifest_dir.join("tests/fixtures").join(path);
    let content = fs::read_to_string(&scenario_path)
        .unwrap_or_else(|e| panic!("failed to read {scenario_path:?}: {e}"));
    let content = content.replace("__BASE_URL__", base_url);

    Scenario::from_yaml(&content)
        .unwrap_or_else(|e| panic!("failed to parse scenario yaml: {e}"))
}

fn assert_error_contains(result: &boson::ScenarioResult, needle: &str) {
    let step = result
        .steps
        .iter()
        .find(|step| !step.success)
        .expect("expected failing step");
    let error = step
        .error
        .as_ref()
        .expect("expected error message for failing step");
    assert!(
        error.contains(needle),
        "error message did not contain '{needle}': {error}"
    );
}

#[tokio::test]
async fn login_chain_captures_token_and_passes_all_assertion_kinds() {
    let server = TestServer::spawn().await;
    let scenario = load_scenario("login_chain.yaml", &server.base_url);
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor
        .run(&scenario)
        .await
        .expect("executor returned error for login chain");

    // The profile endpoint only answers 200 to the exact captured
    // token, so a pass proves the substitution happened on the wire.
    assert!(result.success, "scenario should succeed: {:?}", result.error);
    assert_eq!(result.steps.len(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn capture_miss_keeps_placeholder_and_fails_at_assertion_time() {
    let server = TestServer::spawn().await;
    let scenario = load_scenario("capture_miss.yaml", &server.base_url);
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor
        .run(&scenario)
        .await
        .expect("executor returned error for capture miss scenario");

    // The missing capture only warns; the second step still runs
    // with the literal placeholder and fails its value assertion.
    assert!(!result.success, "scenario should fail");
    assert_eq!(result.steps.len(), 2, "both steps should have run");
    assert!(result.steps[0].success, "login step should pass");
    assert_error_contains(&result, "$.path");

    server.shutdown().await;
}

#[tokio::test]
async fn auth_step_refreshes_via_designated_login_step() {
    let server = TestServer::spawn().await;
    let scenario = load_scenario("auth_refresh.yaml", &server.base_url);
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor
        .run(&scenario)
        .await
        .expect("executor returned error for auth refresh scenario");

    // The protected step comes first in the sequence; it can only
    // pass if the executor ran the login step on demand and injected
    // the bearer header.
    assert!(result.success, "scenario should succeed: {:?}", result.error);

    server.shutdown().await;
}

#[tokio::test]
async fn protected_endpoint_rejects_run_without_auth_declaration() {
    let server = TestServer::spawn().await;
    let yaml = format!(
        "name: no auth\nconfig:\n  base_url: {}\nsteps:\n  - name: profile\n    \
         method: GET\n    path: /api/profile\n    expected:\n      status_code: 200\n",
        server.base_url
    );
    let scenario = Scenario::from_yaml(&yaml).unwrap();
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor.run(&scenario).await.unwrap();
    assert!(!result.success);
    assert_error_contains(&result, "expected 200, actual 401");

    server.shutdown().await;
}

#[tokio::test]
async fn status_mismatch_reports_expected_and_actual() {
    let server = TestServer::spawn().await;
    let scenario = load_scenario("status_mismatch.yaml", &server.base_url);
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor
        .run(&scenario)
        .await
        .expect("executor returned error for status mismatch");

    assert!(!result.success, "scenario should fail");
    assert_error_contains(&result, "expected 201, actual 200");

    server.shutdown().await;
}

#[tokio::test]
async fn body_subset_failure_names_the_missing_path() {
    let server = TestServer::spawn().await;
    let scenario = load_scenario("body_subset_failure.yaml", &server.base_url);
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor
        .run(&scenario)
        .await
        .expect("executor returned error for body subset scenario");

    assert!(!result.success, "scenario should fail");
    assert_error_contains(&result, "$.data.owner");

    server.shutdown().await;
}

#[tokio::test]
async fn array_assertions_pass_against_live_response() {
    let server = TestServer::spawn().await;
    let scenario = load_scenario("array_assertions.yaml", &server.base_url);
    let mut executor = ScenarioExecutor::with_defaults();

    let result = executor
        .run(&scenario)
        .await
        .expect("executor returned error for array assertions scenario");

    assert!(result.success, "scenario should succeed: {:?}", result.error);

    server.shutdown().await;
}
