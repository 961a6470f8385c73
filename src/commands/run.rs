//! Background loop: JSON-line messages in, JSON-line responses out.

use super::report::background;
use super::Services;
use crate::background::{Background, Message, Response};
use crate::store::StorageArea;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// How often the settings file is checked for edits made by other commands.
const SETTINGS_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Runs the background service until stdin closes.
pub struct RunCommand<'a> {
    services: &'a Services,
    refresh_interval: Duration,
}

impl<'a> RunCommand<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services, refresh_interval: SETTINGS_REFRESH_INTERVAL }
    }

    /// Overrides the settings file polling interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Serves stdin/stdout.
    pub async fn execute(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Starts a fresh session and answers one message per input line.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.services
            .store
            .clear_area(StorageArea::Session)
            .await
            .context("Failed to reset session storage")?;

        let background = background(self.services)?;
        let watcher = background.start().await;
        let refresh = self.services.store.spawn_refresh(self.refresh_interval);

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read message")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = handle_line(&background, line).await;
            let mut out = serde_json::to_string(&response).context("Failed to encode response")?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await.context("Failed to write response")?;
            writer.flush().await?;
        }

        info!("Input closed, stopping background service");
        refresh.abort();
        watcher.abort();
        Ok(())
    }
}

async fn handle_line(background: &Background, line: &str) -> Response {
    match serde_json::from_str::<Message>(line) {
        Ok(message) => {
            debug!("Received {:?}", message);
            background.handle(message).await
        }
        Err(e) => {
            warn!("Invalid message: {}", e);
            Response::Error { error: format!("Invalid message: {}", e) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::services;
    use crate::config::Config;
    use crate::engine::RuleEngine;
    use crate::store;
    use serde_json::Value;

    async fn run(services: &Services, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        RunCommand::new(services).serve(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_serve_message_sequence() {
        let (services, _dir) = services(Config::default()).await;
        let input = concat!(
            r#"{"type":"GET_PRODUCT"}"#,
            "\n",
            r#"{"type":"PRODUCT_DATA","data":{"asin":"B0CTHXMYL8","productUrl":"https://www.amazon.de/dp/B0CTHXMYL8"}}"#,
            "\n\n",
            r#"{"type":"GET_PRODUCT"}"#,
            "\n",
            "not json\n",
        );

        let responses = run(&services, input).await;
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0], serde_json::json!({"product": null}));
        assert_eq!(responses[1], serde_json::json!({"stored": true}));
        assert_eq!(responses[2]["product"]["asin"], "B0CTHXMYL8");
        assert!(responses[3]["error"].as_str().unwrap().starts_with("Invalid message"));
    }

    #[tokio::test]
    async fn test_serve_starts_with_fresh_session_and_synced_rules() {
        let (services, _dir) = services(Config::default()).await;
        let product = crate::amazon::ProductRecord::new("B0CTHXMYL8", "https://www.amazon.de/dp/B0CTHXMYL8");
        store::save_product(services.store.as_ref(), &product).await.unwrap();
        let mut tags = store::TagMapping::new();
        tags.set("fr", "fr-21");
        store::save_tags(services.store.as_ref(), &tags).await.unwrap();

        let responses = run(&services, "{\"type\":\"GET_PRODUCT\"}\n").await;
        assert_eq!(responses[0], serde_json::json!({"product": null}));

        let rules = services.engine.list_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].tag_value(), Some("fr-21"));
    }

    #[tokio::test]
    async fn test_serve_resyncs_on_tags_saved_by_another_process() {
        let (services, _dir) = services(Config::default()).await;
        let (mut input, server) = tokio::io::duplex(1024);
        let mut output = Vec::new();

        let command = RunCommand::new(&services).with_refresh_interval(Duration::from_millis(10));
        let serving = command.serve(BufReader::new(server), &mut output);

        let editing = async {
            input.write_all(b"{\"type\":\"GET_TAGS\"}\n").await.unwrap();

            let cli = store::JsonFileStore::open(services.config.settings_path()).await.unwrap();
            let mut tags = store::TagMapping::new();
            tags.set("de", "cli-21");
            store::save_tags(&cli, &tags).await.unwrap();

            let mut installed = Vec::new();
            for _ in 0..500 {
                installed = services.engine.list_rules().await.unwrap();
                if !installed.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            drop(input);
            installed
        };

        let (served, installed) = tokio::join!(serving, editing);
        served.unwrap();

        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].tag_value(), Some("cli-21"));
        let output = String::from_utf8(output).unwrap();
        let responses: Vec<Value> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].get("tags").is_some());
    }
}
