//! outbound-gate CLI.
//!
//! Fetches every URL given on the command line through one admission gate,
//! so the configured concurrency, rate and backoff limits apply exactly as
//! they would to an embedding application.

use clap::Parser;
use futures_util::future::join_all;
use reqwest::Method;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use outbound_gate::config::loader::load_config;
use outbound_gate::config::validation::clamp_warnings;
use outbound_gate::config::watcher::ConfigWatcher;
use outbound_gate::config::GateConfig;
use outbound_gate::observability::{logging, metrics};
use outbound_gate::transport::ReqwestTransport;
use outbound_gate::{Gate, RequestOptions};

#[derive(Parser)]
#[command(name = "outbound-gate")]
#[command(about = "Fetch URLs through a rate-limited, deduplicating admission gate", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request body, sent as text.
    #[arg(short, long)]
    data: Option<String>,

    /// Print one JSON object per line instead of plain text.
    #[arg(long)]
    json: bool,

    /// URLs to fetch.
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    for warning in clamp_warnings(&config.scheduler) {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        global_max_concurrent = config.scheduler.global_max_concurrent,
        per_host_max_concurrent = config.scheduler.per_host_max_concurrent,
        per_host_rate_limit_per_min = config.scheduler.per_host_rate_limit_per_min,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let transport = ReqwestTransport::new(&config.transport)?;
    let gate = Gate::new(transport, config.scheduler.clone());

    // Keep the watcher alive for the whole run.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, mut patches) = ConfigWatcher::new(path, config.clone());
            let handle = watcher.run()?;
            let gate = gate.clone();
            tokio::spawn(async move {
                while let Some(patch) = patches.recv().await {
                    gate.update_config(patch);
                }
            });
            Some(handle)
        }
        _ => None,
    };

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())?;
    let mut options = RequestOptions::get().with_method(method);
    if let Some(data) = cli.data {
        options = options.with_body(data);
    }

    let mut failures = 0usize;
    let mut pending = Vec::with_capacity(cli.urls.len());
    for url in &cli.urls {
        match gate.enqueue(url, options.clone()) {
            Ok(future) => pending.push((url.clone(), Instant::now(), future)),
            Err(e) => {
                failures += 1;
                report(cli.json, url, Err(e.to_string()), 0);
            }
        }
    }

    let settled = join_all(pending.into_iter().map(|(url, started, future)| async move {
        let result = future.await;
        (url, result, started.elapsed().as_millis() as u64)
    }))
    .await;

    for (url, result, elapsed_ms) in settled {
        match result {
            Ok(response) => report(cli.json, &url, Ok(response.status.as_u16()), elapsed_ms),
            Err(e) => {
                failures += 1;
                report(cli.json, &url, Err(e.to_string()), elapsed_ms);
            }
        }
    }

    let stats = gate.stats();
    if cli.json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "{} hosts, {} settled, {} failed",
            stats.hosts.len(),
            stats.hosts.iter().map(|h| h.completed).sum::<u64>(),
            failures
        );
        for host in &stats.hosts {
            if let Some(remaining) = host.cooldown_remaining {
                println!("  {} cooling down for {}s", host.host, remaining.as_secs());
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn report(json: bool, url: &str, outcome: Result<u16, String>, elapsed_ms: u64) {
    if json {
        let line = match outcome {
            Ok(status) => serde_json::json!({ "url": url, "status": status, "elapsed_ms": elapsed_ms }),
            Err(error) => serde_json::json!({ "url": url, "error": error, "elapsed_ms": elapsed_ms }),
        };
        println!("{line}");
    } else {
        match outcome {
            Ok(status) => println!("{status} {url} ({elapsed_ms} ms)"),
            Err(error) => println!("ERR {url}: {error}"),
        }
    }
}
