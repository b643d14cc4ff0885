//! Common test utilities for E2E testing with mocks.
//!
//! Provides a test fixture that builds the in-process router with a mock
//! generation backend injected, so the full HTTP surface can be exercised
//! without external infrastructure.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use atelier_core::testing::MockBackend;
use atelier_core::{Config, Orchestrator, WorkerRegistry};

/// Re-export fixtures for test convenience
pub use atelier_core::testing::fixtures;

/// Test fixture for E2E testing with a mock generation backend.
///
/// The scheduling loops are not started; tests drive the scheduler
/// deterministically via `tick()`.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The orchestrator behind the router, for driving ticks directly
    pub orchestrator: Arc<Orchestrator>,
    /// Mock backend - inspect dispatches, inject failures
    pub backend: Arc<MockBackend>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default config.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(config: Config) -> Self {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(WorkerRegistry::new(config.orchestrator.overload_ratio));
        let orchestrator = Arc::new(Orchestrator::new(
            config.orchestrator.clone(),
            registry,
            backend.clone(),
        ));

        let state = Arc::new(atelier_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
        ));
        let router = atelier_server::api::create_router(state);

        Self {
            router,
            orchestrator,
            backend,
        }
    }

    /// Run one scheduling pass.
    pub async fn tick(&self) -> usize {
        self.orchestrator.tick().await
    }

    /// Register a worker that can take any fixture task.
    pub async fn register_large_worker(&self, worker_id: &str) {
        self.orchestrator
            .registry()
            .register(
                worker_id.to_string(),
                fixtures::all_capabilities(),
                fixtures::large_capacity(),
            )
            .await;
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
