use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackhub_core::metrics::all_metrics;
use trackhub_core::rules::SecurityPolicy;
use trackhub_core::{
    load_config, validate_config, AcquisitionPipeline, AcquisitionRequest, Config, Decision,
    DecisionService, DownloadInitiator, HandoffError, IndexerRegistry, MediaType,
    SanitizedConfig, SearchOrchestrator, SearchRequest, SubscriptionCriteria, TorrentResult,
};

/// Multi-tracker torrent search and acquisition decisions.
#[derive(Debug, Parser)]
#[command(name = "trackhub", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, short, env = "TRACKHUB_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// JSON logs and JSON command output.
    #[arg(long, global = true)]
    json: bool,

    /// Print Prometheus metrics to stderr when done.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search every healthy indexer.
    Search(SearchArgs),
    /// Probe every indexer and report health.
    Health,
    /// List configured indexers and their state.
    Indexers,
    /// Print the loaded configuration with credentials hidden.
    Config,
    /// Search, filter, decide and hand off the best candidate.
    Acquire(AcquireArgs),
}

#[derive(Debug, Args)]
struct SearchArgs {
    query: String,

    #[arg(long)]
    media_type: Option<MediaType>,

    #[arg(long)]
    year: Option<u32>,

    /// Restrict to these indexers (repeatable).
    #[arg(long = "indexer")]
    indexers: Vec<String>,

    /// Per-indexer timeout override in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Args)]
struct AcquireArgs {
    #[command(flatten)]
    search: SearchArgs,

    #[arg(long)]
    resolution: Option<String>,

    #[arg(long)]
    quality: Option<String>,

    #[arg(long)]
    effect: Option<String>,

    #[arg(long)]
    codec: Option<String>,

    #[arg(long, default_value_t = 0)]
    min_seeders: u32,

    /// Comma-separated keywords or /regex/.
    #[arg(long)]
    include: Option<String>,

    /// Comma-separated keywords or /regex/.
    #[arg(long)]
    exclude: Option<String>,

    #[arg(long)]
    min_size_gb: Option<f64>,

    #[arg(long)]
    max_size_gb: Option<f64>,

    #[arg(long)]
    season: Option<u32>,

    #[arg(long)]
    start_episode: Option<u32>,

    #[arg(long)]
    end_episode: Option<u32>,

    #[arg(long)]
    allow_hr: bool,

    #[arg(long)]
    allow_h3h5: bool,

    #[arg(long)]
    free_only: bool,
}

impl SearchArgs {
    fn to_request(&self) -> SearchRequest {
        let mut request = SearchRequest::new(&self.query);
        request.media_type = self.media_type;
        request.year = self.year;
        if !self.indexers.is_empty() {
            request = request.with_indexers(self.indexers.iter().cloned());
        }
        request
    }
}

impl AcquireArgs {
    fn to_criteria(&self) -> SubscriptionCriteria {
        SubscriptionCriteria {
            media_type: self.search.media_type,
            quality: self.quality.clone(),
            resolution: self.resolution.clone(),
            effect: self.effect.clone(),
            codec: self.codec.clone(),
            min_seeders: self.min_seeders,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            filter_groups: Vec::new(),
            min_size_gb: self.min_size_gb,
            max_size_gb: self.max_size_gb,
            season: self.season,
            start_episode: self.start_episode,
            end_episode: self.end_episode,
            security: SecurityPolicy {
                allow_hr: self.allow_hr,
                allow_h3h5: self.allow_h3h5,
                strict_free_only: self.free_only,
            },
        }
    }
}

/// Hands off by printing the link; a real download client plugs in here.
struct StdoutInitiator {
    json: bool,
}

#[derive(Serialize)]
struct Handoff<'a> {
    title: &'a str,
    site: &'a str,
    link: Option<&'a str>,
    decision: &'a Decision,
}

#[async_trait]
impl DownloadInitiator for StdoutInitiator {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn initiate(
        &self,
        result: &TorrentResult,
        decision: &Decision,
    ) -> Result<(), HandoffError> {
        let link = result
            .magnet_link
            .as_deref()
            .or(result.torrent_url.as_deref());
        if link.is_none() {
            return Err(HandoffError::Rejected(format!(
                "'{}' has no download link",
                result.title
            )));
        }

        if self.json {
            let handoff = Handoff {
                title: &result.title,
                site: &result.site,
                link,
                decision,
            };
            let line = serde_json::to_string(&handoff)
                .map_err(|e| HandoffError::Rejected(e.to_string()))?;
            println!("{}", line);
        } else {
            println!(
                "HANDOFF {} [{}] score={:.1}\n  {}",
                result.title,
                result.site,
                decision.score,
                link.unwrap_or_default()
            );
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    let registry = Arc::new(
        IndexerRegistry::from_configs(&config.indexers).context("Failed to build indexers")?,
    );
    info!(indexers = registry.len().await, "Indexers ready");

    match &cli.command {
        Command::Search(args) => search(&config, registry, args, cli.json).await?,
        Command::Health => health(registry, cli.json).await?,
        Command::Indexers => {
            let statuses = registry.statuses().await;
            if cli.json {
                print_json(&statuses)?;
            } else {
                for s in statuses {
                    println!(
                        "{:<20} {:<8} healthy={:<5} errors={}/{}",
                        s.name,
                        format!("{:?}", s.access).to_lowercase(),
                        s.healthy,
                        s.error_count,
                        s.max_consecutive_errors
                    );
                }
            }
        }
        Command::Config => print_json(&SanitizedConfig::from(&config))?,
        Command::Acquire(args) => acquire(&config, registry, args, cli.json).await?,
    }

    if cli.metrics {
        dump_metrics().context("Failed to encode metrics")?;
    }
    Ok(())
}

async fn search(
    config: &Config,
    registry: Arc<IndexerRegistry>,
    args: &SearchArgs,
    json: bool,
) -> Result<()> {
    let orchestrator = SearchOrchestrator::from_config(registry, &config.search);
    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.search.per_indexer_timeout());

    let report = orchestrator
        .search_with_report(&args.to_request(), timeout)
        .await;

    if json {
        print_json(&report)?;
    } else {
        for r in &report.results {
            println!(
                "{:>6} seeders  {:>8.2} GB  [{}] {}",
                r.seeders, r.size_gb, r.site, r.title
            );
        }
        println!(
            "{} results from {}/{} indexers in {} ms",
            report.results.len(),
            report.responded.len(),
            report.queried.len(),
            report.duration_ms
        );
        for s in &report.skipped {
            println!("skipped {}: {}", s.name, s.reason);
        }
        for name in &report.timed_out {
            println!("timed out: {}", name);
        }
    }
    Ok(())
}

async fn health(registry: Arc<IndexerRegistry>, json: bool) -> Result<()> {
    let results = registry.health_check_all().await;
    if json {
        print_json(&results)?;
    } else {
        for (name, ok) in results {
            println!("{:<20} {}", name, if ok { "ok" } else { "FAILED" });
        }
    }
    Ok(())
}

async fn acquire(
    config: &Config,
    registry: Arc<IndexerRegistry>,
    args: &AcquireArgs,
    json: bool,
) -> Result<()> {
    let mut orchestrator = SearchOrchestrator::from_config(registry, &config.search);
    if let Some(secs) = args.search.timeout_secs {
        orchestrator = orchestrator.with_per_indexer_timeout(Duration::from_secs(secs));
    }

    let pipeline = AcquisitionPipeline::new(
        Arc::new(orchestrator),
        DecisionService::new(config.decision.clone()),
        Arc::new(StdoutInitiator { json }),
    );

    let request = AcquisitionRequest::new(args.search.to_request(), args.to_criteria());
    let report = pipeline.acquire(&request).await;

    if json {
        print_json(&report)?;
    } else {
        let c = report.counts;
        println!(
            "searched={} deduplicated={} after_security={} after_rules={} decided={}",
            c.searched, c.deduplicated, c.after_security, c.after_rules, c.decided
        );
        println!("outcome: {:?}", report.outcome);
        if let Some(d) = &report.decision {
            println!("decision: {} {} ({:.1}) {}", d.outcome, d.reason, d.score, d.message);
        }
        for p in &report.pending_confirmation {
            println!("needs confirmation: {} [{}] {}", p.result.title, p.result.site, p.decision.message);
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn dump_metrics() -> Result<()> {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    eprint!("{}", String::from_utf8_lossy(&buf));
    Ok(())
}
