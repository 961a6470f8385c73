//! amz-affiliate - Amazon affiliate-tag redirect rules, product capture and margin reporting
//!
//! One-shot commands edit settings and inspect rules; `run` is the long-lived
//! background worker speaking JSON lines on stdin/stdout.

use amz_affiliate::commands::{
    ProductCommand, ReportCommand, RulesCommand, RunCommand, Services, TagsCommand,
};
use amz_affiliate::config::{Config, OutputFormat};
use amz_affiliate::rules::RuleStrategy;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "amz-affiliate",
    version,
    about = "Amazon affiliate-tag redirect rules and product reporting",
    long_about = "Compiles per-marketplace affiliate tags into redirect rules, keeps them installed, and reports captured products to an API or Discord."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for settings and installed rules
    #[arg(long, global = true, env = "AMZ_AFFILIATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Redirect rule strategy (product_rewrite, query_transform)
    #[arg(long, global = true)]
    strategy: Option<RuleStrategy>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "AMZ_PROXY")]
    proxy: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List marketplaces and their tags
    #[command(alias = "m")]
    Marketplaces,

    /// Show or edit affiliate tags
    #[command(subcommand)]
    Tags(TagsAction),

    /// Configure the Discord webhook
    #[command(subcommand)]
    Webhook(WebhookAction),

    /// Compile, inspect or install redirect rules
    #[command(subcommand)]
    Rules(RulesAction),

    /// Show where the installed rules redirect a URL
    Rewrite {
        /// URL to evaluate
        url: String,
    },

    /// Capture a product page and cache it for reporting
    #[command(alias = "p")]
    Product {
        /// Product page URL; shows the cached product when omitted
        url: Option<String>,
    },

    /// Report the cached product
    #[command(subcommand)]
    Report(ReportAction),

    /// Run the background service (JSON-line messages on stdin)
    Run,
}

#[derive(Subcommand)]
enum TagsAction {
    /// Show configured tags
    Show,
    /// Set tags, e.g. `de=mytag-21 fr=mytag-21`
    Set {
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Clear tags for the given marketplaces, or all tags
    Clear { ids: Vec<String> },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Set the Discord webhook URL (empty clears it)
    Set { url: String },
}

#[derive(Subcommand)]
enum RulesAction {
    /// Print the rules the current tags compile to
    Compile,
    /// Print the installed rules
    Show,
    /// Install rules for the current tags
    Sync,
}

#[derive(Subcommand)]
enum ReportAction {
    /// POST the cached product to the report API
    Api,
    /// Send a margin report to Discord
    Discord {
        /// Buy price
        #[arg(long)]
        buy: f64,
        /// Sell price
        #[arg(long)]
        sell: f64,
        /// Marketplace the product is sold in (e.g. fr)
        #[arg(long)]
        country: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output and `run` responses
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(strategy) = cli.strategy {
        config.rule_strategy = strategy;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }
    if let Some(format) = cli.format {
        config.format = format;
    }

    let services = Services::open(config).await?;

    let output = match cli.command {
        Commands::Marketplaces => TagsCommand::new(&services).marketplaces().await?,

        Commands::Tags(action) => {
            let cmd = TagsCommand::new(&services);
            match action {
                TagsAction::Show => cmd.show().await?,
                TagsAction::Set { assignments } => cmd.set(&assignments).await?,
                TagsAction::Clear { ids } => cmd.clear(&ids).await?,
            }
        }

        Commands::Webhook(WebhookAction::Set { url }) => {
            TagsCommand::new(&services).set_webhook(&url).await?
        }

        Commands::Rules(action) => {
            let cmd = RulesCommand::new(&services);
            match action {
                RulesAction::Compile => cmd.compile().await?,
                RulesAction::Show => cmd.show().await?,
                RulesAction::Sync => cmd.sync().await?,
            }
        }

        Commands::Rewrite { url } => RulesCommand::new(&services).rewrite(&url).await?,

        Commands::Product { url } => {
            let cmd = ProductCommand::new(&services);
            match url {
                Some(url) => cmd.execute(&url).await?,
                None => cmd.show().await?,
            }
        }

        Commands::Report(action) => {
            let cmd = ReportCommand::new(&services)?;
            match action {
                ReportAction::Api => cmd.api().await?,
                ReportAction::Discord { buy, sell, country } => {
                    cmd.discord(buy, sell, &country).await?
                }
            }
        }

        Commands::Run => {
            RunCommand::new(&services).execute().await?;
            return Ok(());
        }
    };

    println!("{}", output);
    Ok(())
}
