//! Outbound webhook dispatch.
//!
//! One POST per accepted lead, bounded by a timeout. No retries here; if a
//! caller wants retry semantics it owns them.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::models::WebhookPayload;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("webhook request timed out")]
    Timeout,
    #[error("webhook request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("webhook rejected with status {status}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait WebhookApi: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        payload: &WebhookPayload,
        timeout: Duration,
    ) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, Default)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookApi for WebhookClient {
    async fn send(
        &self,
        endpoint: &str,
        payload: &WebhookPayload,
        timeout: Duration,
    ) -> Result<(), DispatchError> {
        // The per-request timeout aborts the in-flight request on expiry,
        // not just the wait for it.
        let response = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout
                } else {
                    DispatchError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
