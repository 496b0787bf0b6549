//! Harvester CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use harvester::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, Harvester},
    services::ArticleExtractor,
    storage::{self, ArticleStore, LocalStorage},
    utils::{self, http::ReqwestFetcher, log as console},
};
use tokio_util::sync::CancellationToken;

/// Harvester - Sitemap and Feed Article Harvester
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Harvests sitemaps and RSS/RDF feeds into canonical article records"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll feeds and store newly discovered articles
    Run {
        /// Only harvest feeds of this outlet
        #[arg(long)]
        outlet: Option<String>,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Re-run field inference over stored articles
    Reresolve {
        /// Only re-resolve articles of this outlet
        #[arg(long)]
        outlet: Option<String>,
    },

    /// List recently published articles
    Recent {
        /// How many days back to look
        #[arg(long, default_value_t = 3)]
        days: u32,
    },

    /// Validate the configuration file
    Validate,

    /// Show storage info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, finishing current work...");
            token.cancel();
        }
    });
}

fn format_time(epoch: Option<i64>) -> String {
    epoch
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".into())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Harvester starting...");

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    let config = Arc::new(config);
    let store = LocalStorage::new(&config.storage.root_dir);

    match cli.command {
        Command::Run { outlet, once } => {
            config.validate()?;
            tokio::fs::create_dir_all(&config.storage.root_dir).await?;

            let fetcher = Arc::new(ReqwestFetcher::new(&config.crawler)?);
            let archive = storage::build_archive(&config.archive, fetcher.clone()).await?;
            let harvester = Harvester::new(Arc::clone(&config), fetcher, Arc::new(store))
                .with_outlet(outlet.as_deref())
                .with_extractor(ArticleExtractor::with_archive(archive));

            if harvester.feeds().is_empty() {
                return Err(AppError::config(match outlet {
                    Some(o) => format!("No feeds configured for outlet {:?}", o),
                    None => "No feeds configured".to_string(),
                }));
            }

            console::header("Harvest");
            console::sub_item(&format!("Feeds: {}", harvester.feeds().len()));
            console::sub_item(&format!(
                "Interval: {}s",
                config.harvest.interval_secs
            ));

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let cycles = harvester
                .run(&cancel, if once { Some(1) } else { None })
                .await;

            log::info!("Harvest stopped after {} cycle(s)", cycles);
        }

        Command::Reresolve { outlet } => {
            console::step(1, 1, "Re-resolving stored articles");
            let report = pipeline::reresolve(&store, outlet.as_deref()).await?;
            console::summary(
                "Re-resolution",
                &[
                    ("Examined", report.examined.to_string()),
                    ("Updated", report.updated.to_string()),
                    ("Unchanged", report.unchanged.to_string()),
                    ("Manual", report.skipped_manual.to_string()),
                    ("Failed", report.failures.to_string()),
                ],
            );
        }

        Command::Recent { days } => {
            let since = pipeline::since_days(Utc::now(), days);
            let records = pipeline::recent(&store, since).await?;

            console::header(&format!("{} article(s) in the last {} day(s)", records.len(), days));
            for record in records {
                let site = record
                    .og
                    .site_name
                    .clone()
                    .or_else(|| utils::get_domain(&record.og.url))
                    .unwrap_or_default();
                println!();
                println!("{}", record.og.title.as_deref().unwrap_or("(untitled)"));
                println!("  Date:   {}", format_time(record.wa.publish_time));
                if let Some(author) = &record.article.author {
                    println!("  Author: {}", author.username);
                }
                println!("  Site:   {}", site);
                println!("  URL:    {}", record.og.url);
                if let Some(image) = &record.og.image {
                    println!("  Image:  {}", image);
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            console::summary(
                "Configuration",
                &[
                    ("Feeds", config.feeds.len().to_string()),
                    ("Storage", config.storage.root_dir.display().to_string()),
                    ("Interval", format!("{}s", config.harvest.interval_secs)),
                    ("Concurrency", config.crawler.max_concurrent.to_string()),
                    ("Robots", config.crawler.respect_robots.to_string()),
                    (
                        "Archive",
                        if config.archive.enabled {
                            config.archive.backend.clone()
                        } else {
                            "disabled".into()
                        },
                    ),
                ],
            );
            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", store.root_dir().display());
            match store.list_known_keys().await {
                Ok(keys) => log::info!("Stored articles: {}", keys.len()),
                Err(e) => log::warn!("Cannot read storage index: {}", e),
            }
            for feed in &config.feeds {
                console::sub_item(&format!("{} ({})", feed.url, feed.outlet));
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
