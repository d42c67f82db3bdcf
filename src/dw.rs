//! HTTP client for the DandoriWork (DW) site-management service.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::order::{DwCostReport, DwOrderPayload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the DW API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwConfig {
    /// Base URL, e.g. `https://dw.example.com/api`.
    pub endpoint: String,
    pub api_key: String,
}

impl DwConfig {
    /// Settings from `DW_API_ENDPOINT` and `DW_API_KEY`; `None` unless both
    /// are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("DW_API_ENDPOINT").ok()?;
        let api_key = std::env::var("DW_API_KEY").ok()?;
        Self::new(endpoint, api_key)
    }

    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Option<Self> {
        let endpoint = endpoint.into().trim().trim_end_matches('/').to_string();
        let api_key = api_key.into().trim().to_string();
        if endpoint.is_empty() || api_key.is_empty() {
            return None;
        }
        Some(Self { endpoint, api_key })
    }
}

#[derive(Debug, Error)]
pub enum DwError {
    #[error("DW integration is not configured")]
    NotConfigured,
    #[error("DW request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("DW API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct PushOrderResponse {
    dw_order_id: String,
}

/// Thin JSON client over the DW REST API.
#[derive(Debug, Clone)]
pub struct DwClient {
    config: DwConfig,
    client: reqwest::Client,
}

impl DwClient {
    pub fn new(config: DwConfig) -> Result<Self, DwError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint, path.trim_start_matches('/'))
    }

    /// Register an order with DW and return the id DW assigned to it.
    pub async fn push_order(&self, payload: &DwOrderPayload) -> Result<String, DwError> {
        let response = self
            .client
            .post(self.url("orders"))
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        let body: PushOrderResponse = Self::checked(response).await?.json().await?;
        Ok(body.dw_order_id)
    }

    /// Fetch the current cost report of a DW order.
    pub async fn fetch_costs(&self, dw_order_id: &str) -> Result<DwCostReport, DwError> {
        let response = self
            .client
            .get(self.url(&format!("orders/{dw_order_id}/costs")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let mut report: DwCostReport = Self::checked(response).await?.json().await?;
        if report.dw_order_id.is_empty() {
            report.dw_order_id = dw_order_id.to_string();
        }
        Ok(report)
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, DwError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DwError::Api { status, body })
    }
}
