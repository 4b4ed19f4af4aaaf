//! Zovo client core - command line front end
//!
//! Module structure:
//! - `domain/` - Core types (LocationEvent, Role, Job, pricing, geo)
//! - `io/` - External interfaces (Socket.IO transport, REST API, map)
//! - `services/` - Channel lifecycle, tracking view, navigation
//! - `infra/` - Infrastructure (Config, Metrics, Backoff)

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use zovo_core::domain::pricing::{compute_breakdown, format_money, PricingQuote};
use zovo_core::error::ApiError;
use zovo_core::infra::{Config, Metrics};
use zovo_core::io::{init_map, ApiClient, Credentials, MapOptions, WsTransport};
use zovo_core::services::{Connector, Sidebar, TrackingView};

/// Zovo client core - live tracking, pricing and job tools
#[derive(Parser, Debug)]
#[command(name = "zovo-core", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow live worker locations until Ctrl+C
    Track {
        /// Realtime endpoint (overrides config and SOCKET_URL)
        #[arg(long)]
        endpoint: Option<String>,
        /// Only follow this worker
        #[arg(long)]
        worker: Option<String>,
        /// Job latitude for distance / ETA
        #[arg(long, requires = "job_lng")]
        job_lat: Option<f64>,
        /// Job longitude for distance / ETA
        #[arg(long, requires = "job_lat")]
        job_lng: Option<f64>,
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Print the price breakdown for a quote file
    Quote {
        /// JSON quote, or a pricing request when --remote is set
        file: String,
        /// Ask the backend to price the request first
        #[arg(long)]
        remote: bool,
    },
    /// List the worker's jobs or move one through its lifecycle
    Jobs {
        #[arg(long, conflicts_with_all = ["start", "complete"])]
        accept: Option<String>,
        #[arg(long, conflicts_with = "complete")]
        start: Option<String>,
        #[arg(long)]
        complete: Option<String>,
    },
    /// Admin dashboards
    Admin {
        #[arg(value_enum)]
        view: AdminView,
    },
    /// Show the navigation for the configured role
    Nav,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum AdminView {
    Stats,
    Transactions,
    Jobs,
    Users,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = %config.config_file(),
        role = %config.role().as_str(),
        realtime_endpoint = ?config.realtime_endpoint(),
        api_base_url = %config.api_base_url(),
        "config_loaded"
    );

    match args.command {
        Command::Track { endpoint, worker, job_lat, job_lng, duration_secs } => {
            let job = job_lat.zip(job_lng);
            track(&config, endpoint, worker, job, duration_secs).await
        }
        Command::Quote { file, remote } => quote(&config, &file, remote).await,
        Command::Jobs { accept, start, complete } => jobs(&config, accept, start, complete).await,
        Command::Admin { view } => admin(&config, view).await,
        Command::Nav => {
            let sidebar = Sidebar::for_role(config.role());
            println!("{}", sidebar.title());
            for item in sidebar.items() {
                println!("  {:<16} {}", item.label, item.path);
            }
            Ok(())
        }
    }
}

async fn track(
    config: &Config,
    endpoint: Option<String>,
    worker: Option<String>,
    job: Option<(f64, f64)>,
    duration_secs: Option<u64>,
) -> anyhow::Result<()> {
    let endpoint = endpoint
        .or_else(|| config.realtime_endpoint().map(str::to_string))
        .context("no realtime endpoint; set [realtime].endpoint, SOCKET_URL or --endpoint")?;

    let metrics = Arc::new(Metrics::new());
    let transport = Arc::new(WsTransport::from_config(config));
    let connector = Connector::new(transport, config).with_metrics(metrics.clone());
    let channel = connector
        .connect(&endpoint, Credentials::from_config(config))
        .await
        .with_context(|| format!("connecting to {endpoint}"))?;

    // Start metrics reporter
    let metrics_interval = config.metrics_interval_secs().max(1);
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics.report().log();
        }
    });

    let mut view = TrackingView::new(init_map(MapOptions::default()), config.event_name());
    if let Some(worker) = worker.as_deref() {
        view = view.with_worker(worker);
    }
    if let Some((lat, lng)) = job {
        view = view.with_job_location(lat, lng);
    }
    view.mount(channel.clone());

    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut status = channel.watch_status();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut seen_updates = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown_signal_received");
                break;
            }
            _ = &mut deadline => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                info!(status = %current, label = view.status_label(), "tracking_status");
            }
            _ = ticker.tick() => {
                let updates = view.updates();
                if updates == seen_updates {
                    continue;
                }
                seen_updates = updates;
                if let Some(last) = view.last_location() {
                    info!(
                        worker_id = %last.worker_id,
                        latitude = last.latitude,
                        longitude = last.longitude,
                        distance_km = ?view.distance_km().map(|d| format!("{d:.2}")),
                        eta_min = ?view.eta_minutes(),
                        updates,
                        "tracking_position"
                    );
                }
            }
        }
    }

    view.unmount();
    reporter.abort();
    channel.metrics().report().log();
    info!("tracking stopped");
    Ok(())
}

async fn quote(config: &Config, file: &str, remote: bool) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {file}"))?;
    let body: Value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {file}"))?;

    let quote: PricingQuote = if remote {
        let client = ApiClient::from_config(config)?;
        client.calculate_price(&body).await.map_err(log_api_error)?
    } else {
        let body = match body {
            Value::Object(mut map) if map.contains_key("breakdown") => {
                map.remove("breakdown").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(body).context("quote does not match the pricing shape")?
    };

    let breakdown = compute_breakdown(Some(&quote))?;
    for line in breakdown.display_lines() {
        println!("{:<28} {:>12}", line.label, line.amount);
    }
    info!(total = %format_money(breakdown.total), modifiers = breakdown.modifiers.len(), "quote_computed");
    Ok(())
}

async fn jobs(
    config: &Config,
    accept: Option<String>,
    start: Option<String>,
    complete: Option<String>,
) -> anyhow::Result<()> {
    let client = ApiClient::from_config(config)?;

    let updated = match (accept, start, complete) {
        (Some(id), _, _) => Some(client.accept_job(&id).await),
        (_, Some(id), _) => Some(client.start_job(&id).await),
        (_, _, Some(id)) => Some(client.complete_job(&id).await),
        _ => None,
    };
    if let Some(result) = updated {
        let job = result.map_err(log_api_error)?;
        println!("{} {} {}", job.id, job.status.as_str(), job.title);
        return Ok(());
    }

    let jobs = client.fetch_worker_jobs().await.map_err(log_api_error)?;
    for job in &jobs {
        println!(
            "{:<26} {:<12} {:<32} {}",
            job.id,
            job.status.as_str(),
            job.title,
            job.location_label().unwrap_or("-")
        );
    }
    info!(count = jobs.len(), "jobs_listed");
    Ok(())
}

async fn admin(config: &Config, view: AdminView) -> anyhow::Result<()> {
    let client = ApiClient::from_config(config)?;
    let output = match view {
        AdminView::Stats => {
            serde_json::to_value(client.fetch_admin_analytics().await.map_err(log_api_error)?)?
        }
        AdminView::Transactions => {
            serde_json::to_value(client.fetch_transactions().await.map_err(log_api_error)?)?
        }
        AdminView::Jobs => {
            serde_json::to_value(client.fetch_admin_jobs().await.map_err(log_api_error)?)?
        }
        AdminView::Users => {
            serde_json::to_value(client.fetch_admin_users().await.map_err(log_api_error)?)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Surface auth failures distinctly before bailing
fn log_api_error(e: ApiError) -> ApiError {
    if e.is_unauthorized() {
        warn!("api_unauthorized; token missing or expired");
    }
    e
}
