//! Background service: routes runtime messages and keeps rules synchronized.
//!
//! Messages are JSON objects tagged by `type`, e.g.
//! `{"type": "SEND_DISCORD", "buyPrice": "19.99", "sellPrice": "29.99", "sellCountry": "fr"}`.

use crate::amazon::models::ProductRecord;
use crate::report::discord::parse_price;
use crate::report::{build_embed, ApiReporter, ApiResponse, DiscordOrder, DiscordReporter, ReportError};
use crate::store::{self, ConfigStore, TagMapping};
use crate::sync::{ChangeWatcher, RuleSynchronizer};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A runtime message sent to the background service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Message {
    /// A content script captured a product page
    ProductData { data: ProductRecord },
    /// Returns the cached product
    GetProduct,
    /// Posts the cached product to the report API
    SendProduct,
    /// Posts a margin report for the cached product to Discord
    SendDiscord {
        #[serde(default)]
        buy_price: Option<Value>,
        #[serde(default)]
        sell_price: Option<Value>,
        #[serde(default)]
        sell_country: String,
    },
    /// Returns the configured tags
    GetTags,
    /// Replaces the configured tags
    SaveTags { tags: TagMapping },
    /// Stores the Discord webhook URL
    SetWebhook { url: String },
}

/// Reply to a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Stored { stored: bool },
    Product { product: Option<ProductRecord> },
    Api(ApiResponse),
    Tags { tags: TagMapping },
    Success { success: bool },
    Error { error: String },
}

impl Response {
    fn success() -> Self {
        Response::Success { success: true }
    }
}

/// Reads a price sent either as a JSON number or as form text.
fn price(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

/// The long-running background worker.
pub struct Background {
    store: Arc<dyn ConfigStore>,
    synchronizer: Arc<RuleSynchronizer>,
    api: Option<ApiReporter>,
    discord: DiscordReporter,
}

impl Background {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        synchronizer: Arc<RuleSynchronizer>,
        api: Option<ApiReporter>,
        discord: DiscordReporter,
    ) -> Self {
        Self { store, synchronizer, api, discord }
    }

    /// Subscribes to tag changes and runs the startup synchronization.
    ///
    /// The returned task runs until the store's change stream closes.
    pub async fn start(&self) -> JoinHandle<()> {
        let watcher = ChangeWatcher::spawn(self.store.as_ref(), self.synchronizer.clone());
        info!("Background service started");
        self.synchronizer.synchronize().await;
        watcher
    }

    /// Handles one message; failures become [`Response::Error`].
    pub async fn handle(&self, message: Message) -> Response {
        match self.dispatch(message).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Message failed: {}", e);
                Response::Error { error: e.to_string() }
            }
        }
    }

    async fn dispatch(&self, message: Message) -> Result<Response> {
        match message {
            Message::ProductData { data } => {
                store::save_product(self.store.as_ref(), &data).await?;
                info!("Product stored: {}", data.asin);
                Ok(Response::Stored { stored: true })
            }
            Message::GetProduct => {
                let product = store::load_product(self.store.as_ref()).await?;
                Ok(Response::Product { product })
            }
            Message::SendProduct => {
                let product = self.cached_product().await?;
                let api = self.api.as_ref().ok_or(ReportError::MissingApiUrl)?;
                Ok(Response::Api(api.send(&product).await?))
            }
            Message::SendDiscord { buy_price, sell_price, sell_country } => {
                let order = DiscordOrder {
                    buy_price: price(buy_price.as_ref()),
                    sell_price: price(sell_price.as_ref()),
                    sell_country,
                };
                self.send_discord(&order).await?;
                Ok(Response::success())
            }
            Message::GetTags => {
                let tags = store::load_tags(self.store.as_ref()).await?;
                Ok(Response::Tags { tags })
            }
            Message::SaveTags { tags } => {
                store::save_tags(self.store.as_ref(), &tags).await?;
                debug!("Saved {} tags", tags.normalized().len());
                Ok(Response::success())
            }
            Message::SetWebhook { url } => {
                store::save_webhook(self.store.as_ref(), &url).await?;
                Ok(Response::success())
            }
        }
    }

    async fn cached_product(&self) -> Result<ProductRecord, ReportError> {
        store::load_product(self.store.as_ref()).await?.ok_or(ReportError::MissingProduct)
    }

    /// Builds and posts a Discord margin report for the cached product.
    pub async fn send_discord(&self, order: &DiscordOrder) -> Result<()> {
        let product = self.cached_product().await?;
        order.validate()?;

        let webhook = store::load_webhook(self.store.as_ref())
            .await?
            .ok_or(ReportError::MissingWebhook)?;
        let tags = store::load_tags(self.store.as_ref()).await?;
        let marketplaces = self.synchronizer.marketplaces().await?;

        let embed = build_embed(&product, order, marketplaces, &tags, chrono::Utc::now())?;
        self.discord.send(&webhook, embed).await?;
        Ok(())
    }
}
