//! Product report endpoint.

use super::{http_client, ReportError};
use crate::amazon::models::ProductRecord;
use crate::config::Config;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wreq::Client;

/// Status and raw body returned by the report endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Posts product records as JSON with an `x-api-key` header.
pub struct ApiReporter {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ApiReporter {
    /// Creates a reporter from `api_url`/`api_key` in the config.
    pub fn new(config: &Config) -> Result<Self, ReportError> {
        let url = config.api_url.clone().ok_or(ReportError::MissingApiUrl)?;
        Self::with_endpoint(url, config.api_key.clone(), config.timeout_secs)
    }

    /// Creates a reporter for an explicit endpoint.
    pub fn with_endpoint(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ReportError> {
        Ok(Self { client: http_client(timeout_secs)?, url: url.into(), api_key })
    }

    /// Sends the product; any HTTP status is returned, only transport errors fail.
    pub async fn send(&self, product: &ProductRecord) -> Result<ApiResponse, ReportError> {
        let body = serde_json::to_string(product)?;
        debug!("Product API request: {} {}", self.url, body);

        let mut request = self
            .client
            .post(self.url.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.as_str());
        }

        let response = request.body(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        info!("Product API response: {} for {}", status, product.asin);
        Ok(ApiResponse { status, body })
    }
}
