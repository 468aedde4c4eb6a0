//! Sync gateway speaking JSON to a `valet-server` instance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use valet_shared::{ShiftCode, ShiftRecord};

use crate::error::SyncError;
use crate::gateway::SyncGateway;

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> SyncError {
        if e.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::from(e)
        }
    }
}

async fn rejected(resp: reqwest::Response) -> SyncError {
    let status = resp.status().as_u16();
    let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_default();
    SyncError::Rejected { status, message }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn push(&self, shift: &ShiftRecord) -> Result<ShiftRecord, SyncError> {
        let url = format!("{}/shifts/{}", self.base_url, shift.id);

        let resp = self
            .client
            .put(&url)
            .json(shift)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }

        let merged: ShiftRecord = resp.json().await?;
        debug!(shift_id = %merged.id, cars = merged.cars.len(), "Remote accepted snapshot");
        Ok(merged)
    }

    async fn fetch_by_code(&self, code: &ShiftCode) -> Result<Option<ShiftRecord>, SyncError> {
        let url = format!("{}/shifts/by-code/{}", self.base_url, code);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(rejected(resp).await),
        }
    }
}
