//! Tag, webhook and marketplace commands (the popup's settings form).

use super::Services;
use crate::format::Formatter;
use crate::store::{self, tags::parse_assignment};
use anyhow::{Context, Result};
use tracing::info;

/// Reads and edits the per-marketplace affiliate tags.
pub struct TagsCommand<'a> {
    services: &'a Services,
}

impl<'a> TagsCommand<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    fn formatter(&self) -> Formatter {
        Formatter::new(self.services.config.format)
    }

    /// Lists marketplaces with their tags.
    pub async fn marketplaces(&self) -> Result<String> {
        let marketplaces = self.services.synchronizer.marketplaces().await?;
        let tags = store::load_tags(self.services.store.as_ref()).await?;
        Ok(self.formatter().format_marketplaces(marketplaces, &tags))
    }

    /// Shows the configured tags.
    pub async fn show(&self) -> Result<String> {
        let tags = store::load_tags(self.services.store.as_ref()).await?;
        Ok(self.formatter().format_tags(&tags))
    }

    /// Applies `id=tag` assignments and reinstalls the rules.
    pub async fn set(&self, assignments: &[String]) -> Result<String> {
        let marketplaces = self.services.synchronizer.marketplaces().await?;
        let mut tags = store::load_tags(self.services.store.as_ref()).await?;

        for assignment in assignments {
            let (id, tag) = parse_assignment(assignment).map_err(anyhow::Error::msg)?;
            if !marketplaces.iter().any(|m| m.id == id) {
                let known: Vec<&str> = marketplaces.iter().map(|m| m.id.as_str()).collect();
                anyhow::bail!("Unknown marketplace '{}'. Known: {}", id, known.join(", "));
            }
            info!("Setting tag for {}: {:?}", id, tag);
            tags.set(id, tag);
        }

        self.save(&tags).await
    }

    /// Clears the given marketplaces' tags, or all tags when none are given.
    pub async fn clear(&self, ids: &[String]) -> Result<String> {
        let mut tags = store::load_tags(self.services.store.as_ref()).await?;
        if ids.is_empty() {
            tags = store::TagMapping::new();
        } else {
            for id in ids {
                tags.clear(&id.to_lowercase());
            }
        }
        self.save(&tags).await
    }

    /// Stores the Discord webhook URL.
    pub async fn set_webhook(&self, url: &str) -> Result<String> {
        let trimmed = url.trim();
        if !trimmed.is_empty() {
            url::Url::parse(trimmed).with_context(|| format!("Invalid webhook URL: {}", trimmed))?;
        }
        store::save_webhook(self.services.store.as_ref(), trimmed).await?;
        Ok(if trimmed.is_empty() { "Webhook cleared.".to_string() } else { "Webhook saved.".to_string() })
    }

    async fn save(&self, tags: &store::TagMapping) -> Result<String> {
        store::save_tags(self.services.store.as_ref(), tags).await?;
        let report = self.services.synchronizer.try_synchronize().await?;

        let formatter = self.formatter();
        Ok(format!("{}\n\n{}", formatter.format_tags(&tags.normalized()), formatter.format_sync_report(&report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::services;
    use crate::config::Config;
    use crate::engine::RuleEngine;

    #[tokio::test]
    async fn test_set_installs_rules() {
        let (services, _dir) = services(Config::default()).await;
        let cmd = TagsCommand::new(&services);

        let out = cmd.set(&["DE=mytag-de".to_string(), "fr= ".to_string()]).await.unwrap();
        assert!(out.contains("mytag-de"));
        assert!(out.contains("installed 1 rules"));

        let rules = services.engine.list_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].tag_value(), Some("mytag-de"));
    }

    #[tokio::test]
    async fn test_set_unknown_marketplace() {
        let (services, _dir) = services(Config::default()).await;
        let err = TagsCommand::new(&services).set(&["xx=tag".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("Unknown marketplace 'xx'"));
    }

    #[tokio::test]
    async fn test_set_rejects_malformed_assignment() {
        let (services, _dir) = services(Config::default()).await;
        let err = TagsCommand::new(&services).set(&["de".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("Invalid tag assignment"));
    }

    #[tokio::test]
    async fn test_clear_all_removes_rules() {
        let (services, _dir) = services(Config::default()).await;
        let cmd = TagsCommand::new(&services);
        cmd.set(&["de=a".to_string(), "it=b".to_string()]).await.unwrap();

        cmd.clear(&["IT".to_string()]).await.unwrap();
        assert_eq!(services.engine.list_rules().await.unwrap().len(), 1);

        let out = cmd.clear(&[]).await.unwrap();
        assert!(out.contains("No tags configured."));
        assert!(services.engine.list_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook() {
        let (services, _dir) = services(Config::default()).await;
        let cmd = TagsCommand::new(&services);

        assert!(cmd.set_webhook("not a url").await.is_err());
        cmd.set_webhook("https://discord.com/api/webhooks/1/x").await.unwrap();
        assert_eq!(
            store::load_webhook(services.store.as_ref()).await.unwrap().as_deref(),
            Some("https://discord.com/api/webhooks/1/x")
        );
    }

    #[tokio::test]
    async fn test_marketplaces_listing() {
        let (services, _dir) = services(Config::default()).await;
        let out = TagsCommand::new(&services).marketplaces().await.unwrap();
        for domain in ["amazon.de", "amazon.fr", "amazon.it", "amazon.es"] {
            assert!(out.contains(domain));
        }
    }
}
