//! Output formatting for marketplaces, tags, rules and products (table, JSON).

use crate::amazon::{Marketplace, ProductRecord};
use crate::config::OutputFormat;
use crate::rules::{RedirectRule, RuleMatch};
use crate::store::TagMapping;
use crate::sync::SyncReport;
use serde_json::json;

/// Formats command output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the marketplace list with each marketplace's tag.
    pub fn format_marketplaces(&self, marketplaces: &[Marketplace], tags: &TagMapping) -> String {
        match self.format {
            OutputFormat::Json => {
                let rows: Vec<_> = marketplaces
                    .iter()
                    .map(|m| {
                        json!({
                            "id": m.id,
                            "domain": m.domain,
                            "label": m.label,
                            "tag": tags.tag_for(&m.id),
                        })
                    })
                    .collect();
                pretty(&rows)
            }
            OutputFormat::Table => {
                let mut lines = Vec::new();
                lines.push(format!("{:<4}  {:<16}  {:<24}  {}", "ID", "Domain", "Tag", "Label"));
                lines.push(format!("{:-<4}  {:-<16}  {:-<24}  {:-<24}", "", "", "", ""));
                for m in marketplaces {
                    lines.push(format!(
                        "{:<4}  {:<16}  {:<24}  {} {}",
                        m.id,
                        m.domain,
                        tags.tag_for(&m.id).unwrap_or("-"),
                        m.flag(),
                        m.label
                    ));
                }
                lines.join("\n")
            }
        }
    }

    /// Formats the tag mapping alone.
    pub fn format_tags(&self, tags: &TagMapping) -> String {
        match self.format {
            OutputFormat::Json => pretty(tags),
            OutputFormat::Table if tags.is_empty() => "No tags configured.".to_string(),
            OutputFormat::Table => tags
                .iter()
                .map(|(id, tag)| format!("{:<4}  {}", id, tag))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Formats a rule set.
    pub fn format_rules(&self, rules: &[RedirectRule]) -> String {
        match self.format {
            OutputFormat::Json => pretty(rules),
            OutputFormat::Table if rules.is_empty() => "No rules installed.".to_string(),
            OutputFormat::Table => {
                let mut lines: Vec<String> = rules.iter().map(|r| r.to_string()).collect();
                lines.push(String::new());
                lines.push(format!("Total: {} rules", rules.len()));
                lines.join("\n")
            }
        }
    }

    /// Formats the outcome of a synchronization.
    pub fn format_sync_report(&self, report: &SyncReport) -> String {
        match self.format {
            OutputFormat::Json => pretty(report),
            OutputFormat::Table if report.coalesced => "Already up to date.".to_string(),
            OutputFormat::Table => {
                format!("Removed {} rules, installed {} rules.", report.removed, report.added)
            }
        }
    }

    /// Formats where a navigation would be redirected.
    pub fn format_redirect(&self, url: &str, redirect: Option<&RuleMatch>) -> String {
        match (self.format, redirect) {
            (OutputFormat::Json, Some(m)) => pretty(&json!({
                "url": url,
                "ruleId": m.rule_id,
                "redirectUrl": m.redirect_url,
            })),
            (OutputFormat::Json, None) => pretty(&json!({ "url": url, "redirectUrl": null })),
            (OutputFormat::Table, Some(m)) => format!("{}\n  -> {} (rule #{})", url, m.redirect_url, m.rule_id),
            (OutputFormat::Table, None) => format!("{}\n  (no redirect)", url),
        }
    }

    /// Formats a captured product.
    pub fn format_product(&self, product: &ProductRecord) -> String {
        match self.format {
            OutputFormat::Json => pretty(product),
            OutputFormat::Table => {
                let mut lines = Vec::new();
                lines.push(format!("ASIN:    {}", product.asin));
                lines.push(format!("Title:   {}", or_na(&product.product_name)));
                lines.push(format!("URL:     {}", product.product_url));
                lines.push(format!("Brand:   {}", or_na(&product.brand)));
                lines.push(format!("Image:   {}", or_na(&product.thumbnail_url)));
                if !product.description.is_empty() {
                    lines.push(format!("About:   {}", truncate(&product.description, 120)));
                }
                lines.join("\n")
            }
        }
    }
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{compile, RuleStrategy};

    fn marketplaces() -> Vec<Marketplace> {
        vec![
            Marketplace::new("de", "amazon.de", "Germany (amazon.de)"),
            Marketplace::new("fr", "amazon.fr", "France (amazon.fr)"),
        ]
    }

    fn tags() -> TagMapping {
        [("de".to_string(), "mytag-de".to_string())].into_iter().collect()
    }

    #[test]
    fn test_marketplaces_table() {
        let out = Formatter::new(OutputFormat::Table).format_marketplaces(&marketplaces(), &tags());
        assert!(out.contains("ID"));
        assert!(out.contains("amazon.de"));
        assert!(out.contains("mytag-de"));
        assert!(out.lines().any(|l| l.starts_with("fr") && l.contains(" - ")));
    }

    #[test]
    fn test_marketplaces_json() {
        let out = Formatter::new(OutputFormat::Json).format_marketplaces(&marketplaces(), &tags());
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["tag"], "mytag-de");
        assert!(parsed[1]["tag"].is_null());
    }

    #[test]
    fn test_empty_tags_and_rules() {
        let formatter = Formatter::new(OutputFormat::Table);
        assert_eq!(formatter.format_tags(&TagMapping::new()), "No tags configured.");
        assert_eq!(formatter.format_rules(&[]), "No rules installed.");

        let json = Formatter::new(OutputFormat::Json);
        assert_eq!(json.format_rules(&[]), "[]");
        assert_eq!(json.format_tags(&TagMapping::new()), "{}");
    }

    #[test]
    fn test_rules_table() {
        let rules = compile(&marketplaces(), &tags(), RuleStrategy::ProductRewrite);
        let out = Formatter::new(OutputFormat::Table).format_rules(&rules);
        assert!(out.contains("#1"));
        assert!(out.contains("tag=mytag-de"));
        assert!(out.contains("Total: 1 rules"));
    }

    #[test]
    fn test_rules_json_uses_host_field_names() {
        let rules = compile(&marketplaces(), &tags(), RuleStrategy::ProductRewrite);
        let out = Formatter::new(OutputFormat::Json).format_rules(&rules);
        assert!(out.contains("regexFilter"));
        assert!(out.contains("regexSubstitution"));
    }

    #[test]
    fn test_redirect() {
        let m = RuleMatch { rule_id: 1, redirect_url: "https://www.amazon.de/dp/B0CTHXMYL8/ref=nosim?tag=t".to_string() };
        let table = Formatter::new(OutputFormat::Table);
        assert!(table.format_redirect("https://amazon.de/dp/B0CTHXMYL8", Some(&m)).contains("rule #1"));
        assert!(table.format_redirect("https://amazon.de/", None).contains("no redirect"));

        let json = Formatter::new(OutputFormat::Json).format_redirect("u", Some(&m));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["ruleId"], 1);
    }

    #[test]
    fn test_product_table() {
        let mut product = ProductRecord::new("B0CTHXMYL8", "https://www.amazon.de/dp/B0CTHXMYL8");
        product.product_name = "Widget".to_string();
        product.description = "x".repeat(200);

        let out = Formatter::new(OutputFormat::Table).format_product(&product);
        assert!(out.contains("Title:   Widget"));
        assert!(out.contains("Brand:   N/A"));
        assert!(out.contains("..."));
    }

    #[test]
    fn test_sync_report() {
        let formatter = Formatter::new(OutputFormat::Table);
        let report = SyncReport { removed: 2, added: 1, coalesced: false };
        assert_eq!(formatter.format_sync_report(&report), "Removed 2 rules, installed 1 rules.");
    }
}
