//! Webhook dispatch backend.
//!
//! Posts assignment and cancellation notifications to an external generation
//! service over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::task::Task;

use super::{BackendError, GenerationBackend};

/// Webhook backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Base URL of the generation service (e.g. "http://render-farm:9000").
    pub url: String,
    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Serialize)]
struct DispatchPayload<'a> {
    task: &'a Task,
    worker_id: &'a str,
}

#[derive(Serialize)]
struct CancelPayload<'a> {
    task_id: Uuid,
    worker_id: &'a str,
}

/// Backend that notifies an external generation service over HTTP.
pub struct WebhookBackend {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookBackend {
    pub fn new(config: WebhookConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn post<T: Serialize>(&self, path: &str, payload: &T) -> Result<(), BackendError> {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::Rejected(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for WebhookBackend {
    async fn dispatch(&self, task: &Task, worker_id: &str) -> Result<(), BackendError> {
        self.post("dispatch", &DispatchPayload { task, worker_id })
            .await
    }

    async fn cancel(&self, task_id: Uuid, worker_id: &str) -> Result<(), BackendError> {
        self.post("cancel", &CancelPayload { task_id, worker_id })
            .await
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_timeout() {
        let json = r#"{"url": "http://localhost:9000"}"#;
        let config: WebhookConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_host_is_transport_error() {
        let backend = WebhookBackend::new(WebhookConfig {
            // Reserved TEST-NET address, nothing listens here.
            url: "http://192.0.2.1:1".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let task = Task::new(
            Uuid::new_v4(),
            crate::task::TaskType::Planning,
            crate::task::TaskPriority::Normal,
            chrono::Utc::now(),
        );
        let err = backend.dispatch(&task, "w1").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
