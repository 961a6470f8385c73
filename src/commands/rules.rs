//! Redirect rule commands.

use super::Services;
use crate::engine::RuleEngine;
use crate::format::Formatter;
use anyhow::Result;
use tracing::info;

/// Compiles, inspects and installs redirect rules.
pub struct RulesCommand<'a> {
    services: &'a Services,
}

impl<'a> RulesCommand<'a> {
    pub fn new(services: &'a Services) -> Self {
        Self { services }
    }

    fn formatter(&self) -> Formatter {
        Formatter::new(self.services.config.format)
    }

    /// Prints the rules the current tags compile to, without installing them.
    pub async fn compile(&self) -> Result<String> {
        let rules = self.services.synchronizer.desired_rules().await?;
        Ok(self.formatter().format_rules(&rules))
    }

    /// Prints the installed rules.
    pub async fn show(&self) -> Result<String> {
        let rules = self.services.engine.list_rules().await?;
        Ok(self.formatter().format_rules(&rules))
    }

    /// Reinstalls the rules from the current tags.
    pub async fn sync(&self) -> Result<String> {
        info!("Synchronizing rules ({})", self.services.synchronizer.strategy());
        let report = self.services.synchronizer.try_synchronize().await?;
        Ok(self.formatter().format_sync_report(&report))
    }

    /// Shows where the installed rules send a navigation to `url`.
    pub async fn rewrite(&self, url: &str) -> Result<String> {
        let redirect = self.services.engine.redirect_for(url).await;
        Ok(self.formatter().format_redirect(url, redirect.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::services;
    use crate::commands::TagsCommand;
    use crate::config::{Config, OutputFormat};
    use crate::rules::RuleStrategy;
    use crate::store::{self, TagMapping};

    async fn tag(services: &Services, id: &str, tag: &str) {
        let mut tags = store::load_tags(services.store.as_ref()).await.unwrap();
        tags.set(id, tag);
        store::save_tags(services.store.as_ref(), &tags).await.unwrap();
    }

    #[tokio::test]
    async fn test_compile_does_not_install() {
        let (services, _dir) = services(Config::default()).await;
        tag(&services, "de", "mytag-de").await;

        let cmd = RulesCommand::new(&services);
        let compiled = cmd.compile().await.unwrap();
        assert!(compiled.contains("tag=mytag-de"));
        assert_eq!(cmd.show().await.unwrap(), "No rules installed.");
    }

    #[tokio::test]
    async fn test_sync_then_rewrite() {
        let (services, _dir) = services(Config::default()).await;
        tag(&services, "de", "newtag").await;

        let cmd = RulesCommand::new(&services);
        assert_eq!(cmd.sync().await.unwrap(), "Removed 0 rules, installed 1 rules.");

        let out = cmd
            .rewrite("https://www.amazon.de/Some-Product-Title/dp/B0CTHXMYL8/ref=sr_1_1?tag=oldtag")
            .await
            .unwrap();
        assert!(out.contains("-> https://www.amazon.de/dp/B0CTHXMYL8/ref=nosim?tag=newtag"));

        let out = cmd.rewrite("https://www.amazon.fr/dp/B0CTHXMYL8").await.unwrap();
        assert!(out.contains("no redirect"));
    }

    #[tokio::test]
    async fn test_query_transform_strategy() {
        let config = Config {
            rule_strategy: RuleStrategy::QueryTransform,
            format: OutputFormat::Json,
            ..Config::default()
        };
        let (services, _dir) = services(config).await;
        TagsCommand::new(&services).set(&["it=it-21".to_string()]).await.unwrap();

        let out = RulesCommand::new(&services)
            .rewrite("https://www.amazon.it/s?k=lego&tag=other")
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        let redirect = parsed["redirectUrl"].as_str().unwrap();
        assert!(redirect.starts_with("https://www.amazon.it/s?"));
        assert!(redirect.contains("k=lego"));
        assert_eq!(redirect.matches("tag=").count(), 1);
        assert!(redirect.ends_with("tag=it-21"));
    }

    #[tokio::test]
    async fn test_sync_after_clear() {
        let (services, _dir) = services(Config::default()).await;
        tag(&services, "es", "es-21").await;
        let cmd = RulesCommand::new(&services);
        cmd.sync().await.unwrap();

        store::save_tags(services.store.as_ref(), &TagMapping::new()).await.unwrap();
        assert_eq!(cmd.sync().await.unwrap(), "Removed 1 rules, installed 0 rules.");
    }
}
