use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chereta_bot::format;
use chereta_core::config::require_env;
use chereta_pipeline::{Pipeline, PipelineConfig};
use chereta_scrape::HttpRenderer;
use chereta_store::{PgTenderStore, TenderStore};

const USER_AGENT: &str = concat!("chereta/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Parser)]
#[command(name = "chereta-cli")]
#[command(about = "Tender notifier command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one persisting scrape over the first listing pages.
    Seed {
        #[arg(long, default_value_t = 5)]
        pages: u32,
        /// Skip detail-page enrichment.
        #[arg(long)]
        no_details: bool,
    },
    /// Run persisting scrapes forever at a fixed interval.
    Watch {
        #[arg(long, default_value_t = 2)]
        pages: u32,
        #[arg(long, default_value_t = 6)]
        interval_hours: u64,
        #[arg(long)]
        no_details: bool,
    },
    /// Print tenders published in the last N days, without persisting.
    Recent {
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Serve the chat-facing JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Print the most recent scrape run.
    Status,
}

async fn connect_store() -> Result<Arc<PgTenderStore>> {
    let config = require_env(&["DATABASE_URL"])?;
    let store = PgTenderStore::connect(&config["DATABASE_URL"]).await?;
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

fn pipeline(store: Arc<dyn TenderStore>) -> Result<Pipeline> {
    let renderer = Arc::new(HttpRenderer::new(USER_AGENT)?);
    Ok(Pipeline::new(renderer, store, PipelineConfig::from_env()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Seed { pages, no_details } => {
            let store = connect_store().await?;
            let status = pipeline(store)?.seed(pages, !no_details).await?;
            println!(
                "seed complete: pages={} saved={}",
                status.pages_scraped, status.tenders_saved
            );
        }
        Commands::Watch { pages, interval_hours, no_details } => {
            let store = connect_store().await?;
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            pipeline(store)?.run_forever(interval, pages, !no_details).await;
        }
        Commands::Recent { days } => {
            let renderer = Arc::new(HttpRenderer::new(USER_AGENT)?);
            let store = Arc::new(chereta_store::MemoryStore::new());
            let pipeline = Pipeline::new(renderer, store, PipelineConfig::from_env());
            let tenders = pipeline.collect_recent(days).await?;
            if tenders.is_empty() {
                println!("{}", format::NO_TENDERS);
            }
            for tender in tenders {
                println!("{}\n🔗 {}\n", format::summary_message(&tender), tender.url);
            }
        }
        Commands::Serve { port } => {
            let store = connect_store().await?;
            chereta_bot::serve(store, port).await?;
        }
        Commands::Status => {
            let store = connect_store().await?;
            let status = store.latest_run().await?;
            println!("{}", format::status_message(status.as_ref()));
        }
    }
    Ok(())
}
