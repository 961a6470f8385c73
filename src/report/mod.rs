//! Forwarding captured products to a reporting API or a Discord webhook.
//!
//! Reporting never touches rule state; a failed report is returned to the
//! caller and nothing else.

pub mod api;
pub mod discord;

use crate::store::StoreError;
use std::time::Duration;
use wreq::Client;

pub use api::{ApiReporter, ApiResponse};
pub use discord::{build_embed, DiscordOrder, DiscordReporter, Embed, WebhookPayload};

/// Errors raised while building or sending a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("No product data available")]
    MissingProduct,

    #[error("Invalid sell price")]
    InvalidSellPrice,

    #[error("Invalid buy price")]
    InvalidBuyPrice,

    #[error("No sell country selected")]
    MissingSellCountry,

    #[error("No Discord webhook URL configured")]
    MissingWebhook,

    #[error("No report API URL configured")]
    MissingApiUrl,

    #[error("Discord {status}: {body}")]
    Discord { status: u16, body: String },

    #[error("Request failed: {0}")]
    Http(#[from] wreq::Error),

    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds the plain HTTP client used for outgoing reports.
pub(crate) fn http_client(timeout_secs: u64) -> Result<Client, ReportError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}
