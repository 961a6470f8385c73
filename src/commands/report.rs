//! Reporting commands: send the cached product to the API or to Discord.

use super::Services;
use crate::background::{Background, Message, Response};
use crate::report::{ApiReporter, DiscordReporter};
use anyhow::Result;
use serde_json::json;

/// Sends reports for the cached product.
pub struct ReportCommand {
    background: Background,
}

impl ReportCommand {
    pub fn new(services: &Services) -> Result<Self> {
        Ok(Self { background: background(services)? })
    }

    /// Posts the cached product to the configured API.
    pub async fn api(&self) -> Result<String> {
        match self.background.handle(Message::SendProduct).await {
            Response::Api(response) => Ok(format!("{} {}", response.status, response.body)),
            Response::Error { error } => anyhow::bail!(error),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }

    /// Posts a margin report for the cached product to Discord.
    pub async fn discord(&self, buy: f64, sell: f64, country: &str) -> Result<String> {
        let message = Message::SendDiscord {
            buy_price: Some(json!(buy)),
            sell_price: Some(json!(sell)),
            sell_country: country.to_string(),
        };
        match self.background.handle(message).await {
            Response::Success { .. } => Ok("Discord report sent.".to_string()),
            Response::Error { error } => anyhow::bail!(error),
            other => anyhow::bail!("Unexpected response: {:?}", other),
        }
    }
}

/// Builds the background service over the opened services.
pub(crate) fn background(services: &Services) -> Result<Background> {
    let api = match services.config.api_url {
        Some(_) => Some(ApiReporter::new(&services.config)?),
        None => None,
    };
    let discord = DiscordReporter::new(services.config.timeout_secs)?;

    Ok(Background::new(services.store.clone(), services.synchronizer.clone(), api, discord))
}
