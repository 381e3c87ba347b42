//! Command-line surface: serve, fetch, status, sources, version.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::AppContext;
use crate::config::Settings;
use crate::scheduler::{Scheduler, SchedulerConfig};

#[derive(Parser)]
#[command(name = "brainstream")]
#[command(about = "BrainStream - topology-based serendipity discovery", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server (with the background scheduler, if enabled)
    Serve {
        #[arg(long, help = "Host to bind to (overrides BRAINSTREAM_HOST)")]
        host: Option<String>,
        #[arg(long, help = "Port to bind to (overrides BRAINSTREAM_PORT)")]
        port: Option<u16>,
    },

    /// Fetch articles from data sources
    Fetch {
        #[arg(help = "Specific source to fetch from (omit for all)")]
        source: Option<String>,
        #[arg(long = "skip-llm", help = "Skip LLM processing")]
        skip_llm: bool,
    },

    /// Show system status (articles, clusters, topology)
    Status,

    /// List available data source plugins
    Sources,

    /// Show version information
    Version,
}

impl Commands {
    /// Commands that print results rather than serving; logging stays quiet.
    pub fn is_query_mode(&self) -> bool {
        !matches!(self, Commands::Serve { .. })
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => serve(settings, host, port).await,
        Commands::Fetch { source, skip_llm } => fetch(settings, source, skip_llm).await,
        Commands::Status => status(settings),
        Commands::Sources => sources(),
        Commands::Version => {
            println!("BrainStream v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(mut settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }

    let app = AppContext::new(settings)?;
    println!("Starting BrainStream API server");
    println!("  Host: {}:{}", app.settings.host, app.settings.port);
    println!("  Data: {}", app.settings.data_dir.display());

    let scheduler = Arc::new(Scheduler::new(SchedulerConfig {
        interval: Duration::from_secs(app.settings.fetch_interval_minutes * 60),
        run_on_start: true,
    }));
    if app.settings.scheduler_enabled {
        scheduler.start(app.collector.clone());
    }

    let host = app.settings.host.clone();
    let port = app.settings.port;
    let result = crate::api::serve(app.api_state(scheduler.clone()), &host, port).await;

    scheduler.stop().await;
    result
}

async fn fetch(settings: Settings, source: Option<String>, skip_llm: bool) -> Result<()> {
    let app = AppContext::with_options(settings, skip_llm)?;

    match source {
        Some(source) => {
            println!("Fetching from {source}...");
            let result = app.collector.collect_from(&source).await?;
            println!(
                "  Fetched: {}, New: {}, Processed: {}",
                result.fetched, result.new, result.processed
            );
            for err in &result.errors {
                eprintln!("  Error: {err}");
            }
        }
        None => {
            println!("Fetching from all sources...");
            let summary = app.collector.collect_all().await?;

            println!("{:<24} {:>8} {:>6} {:>10}  Errors", "Source", "Fetched", "New", "Processed");
            for s in &summary.sources {
                println!(
                    "{:<24} {:>8} {:>6} {:>10}  {}",
                    s.source_name,
                    s.fetched,
                    s.new,
                    s.processed,
                    if s.errors.is_empty() {
                        "-".to_string()
                    } else {
                        s.errors.join(", ")
                    }
                );
            }
            println!(
                "\nTotal: {} fetched, {} new, {} processed ({}ms)",
                summary.total_fetched,
                summary.total_new,
                summary.total_processed,
                summary.duration_ms
            );
        }
    }
    Ok(())
}

fn status(settings: Settings) -> Result<()> {
    let app = AppContext::new(settings)?;
    let total = app.topology.total_count()?;
    let clusters = app.topology.topology_info()?;

    println!("BrainStream Status");
    println!("  Data directory: {}", app.settings.data_dir.display());
    println!("  Total articles: {total}");
    println!("  Clusters: {}", clusters.len());

    if clusters.is_empty() {
        println!("  No clusters yet. Run 'brainstream fetch' first.");
        return Ok(());
    }

    println!(
        "{:>4} {:>8} {:>8} {:>6} {:>6}  Sample Titles",
        "ID", "Articles", "Density", "Alpha", "Beta"
    );
    for c in &clusters {
        println!(
            "{:>4} {:>8} {:>8.3} {:>6.1} {:>6.1}  {}",
            c.cluster_id,
            c.article_count,
            c.density,
            c.alpha,
            c.beta,
            if c.sample_titles.is_empty() {
                "-".to_string()
            } else {
                c.sample_titles[..c.sample_titles.len().min(2)].join(" | ")
            }
        );
    }
    Ok(())
}

fn sources() -> Result<()> {
    let registry = crate::plugins::PluginRegistry::with_builtins();

    println!("{:<22} {:<12} {:<10} Description", "Name", "Vendor", "Type");
    for info in registry.infos() {
        println!(
            "{:<22} {:<12} {:<10} {}",
            info.name,
            info.vendor,
            info.source_type.as_str(),
            info.description
        );
    }
    Ok(())
}
