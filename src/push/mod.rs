use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct PushConfig {
    pub gateway_url: String,
    pub token: Option<String>,
}

impl PushConfig {
    /// Reads PUSH_GATEWAY_URL / PUSH_GATEWAY_TOKEN. No URL means no gateway:
    /// the system channel degrades and the other channels carry the load.
    pub fn new_from_env() -> Option<Self> {
        let gateway_url = env::var("PUSH_GATEWAY_URL").ok()?;
        let token = env::var("PUSH_GATEWAY_TOKEN").ok();
        Some(Self { gateway_url, token })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Default,
}

/// Payload forwarded for system-level delivery.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub reminder_id: String,
    pub title: String,
    pub body: String,
    pub trigger_time: DateTime<Utc>,
}

#[async_trait]
pub trait PushClient: Send + Sync {
    async fn request_permission(&self) -> PermissionState;
    async fn send_push(&self, message: &PushMessage) -> Result<(), AppError>;
}

pub struct PushHttpClient {
    client: Client,
    config: PushConfig,
}

impl PushHttpClient {
    pub fn new(config: PushConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PushClient for PushHttpClient {
    /// Probes the gateway once; an unreachable or refusing gateway counts
    /// as a denial and the channel stays quiet for the process lifetime.
    async fn request_permission(&self) -> PermissionState {
        match self.client.get(&self.config.gateway_url).send().await {
            Ok(response) if response.status().is_success() => PermissionState::Granted,
            Ok(response) => {
                tracing::warn!("push gateway refused permission probe: {}", response.status());
                PermissionState::Denied
            }
            Err(e) => {
                tracing::warn!("push gateway unreachable: {}", e);
                PermissionState::Denied
            }
        }
    }

    async fn send_push(&self, message: &PushMessage) -> Result<(), AppError> {
        let mut request = self.client.post(&self.config.gateway_url).json(message);
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::PushGateway(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PushGateway(format!(
                "push gateway error {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Stand-in when no gateway is configured: permission is simply denied.
pub struct NoopPushClient;

#[async_trait]
impl PushClient for NoopPushClient {
    async fn request_permission(&self) -> PermissionState {
        PermissionState::Denied
    }

    async fn send_push(&self, _message: &PushMessage) -> Result<(), AppError> {
        Ok(())
    }
}
