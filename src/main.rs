use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rategate::config::{LimiterConfig, LoggingConfig, RategateConfig};
use rategate::MonotonicClock;

/// Sliding window defaults used when switching algorithms from the command line.
const DEFAULT_LIMIT: usize = 5;
const DEFAULT_WINDOW_MS: u64 = 2000;

/// Read caller keys from stdin, one per line, and print an admission
/// decision for each.
#[derive(Parser, Debug)]
#[command(name = "rategate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured algorithm
    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Sliding window: maximum admissions per window
    #[arg(long)]
    limit: Option<usize>,

    /// Sliding window: window length in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Token bucket: maximum stored tokens
    #[arg(long)]
    capacity: Option<u32>,

    /// Token bucket: tokens added per second
    #[arg(long)]
    refill_per_second: Option<f64>,

    /// Print decisions as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    SlidingWindow,
    TokenBucket,
}

#[derive(Serialize)]
struct Decision<'a> {
    key: &'a str,
    admitted: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RategateConfig::from_file(path)?,
        None => RategateConfig::default(),
    };
    config.limiter = apply_overrides(config.limiter, &args);
    config.validate()?;

    init_tracing(&config.logging);
    log_startup(&args, &config);

    let limiter = config.limiter.build(Arc::new(MonotonicClock))?;
    info!(algorithm = limiter.algorithm(), limiter = ?config.limiter, "Limiter initialized");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => break,
        };

        let Some(line) = line else {
            debug!("End of input");
            break;
        };

        let key = line.trim();
        if key.is_empty() {
            continue;
        }

        let admitted = limiter.admit(key);
        let output = if args.json {
            serde_json::to_string(&Decision { key, admitted })?
        } else {
            format!("{} {}", key, if admitted { "allowed" } else { "denied" })
        };
        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!(keys = limiter.key_count(), "rategate stopped");
    Ok(())
}

/// Install the global tracing subscriber. Logs go to stderr so stdout only
/// carries decisions.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Report the startup configuration. Must run after [`init_tracing`].
fn log_startup(args: &Args, config: &RategateConfig) {
    info!("Starting rategate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match &args.config {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("No configuration file given, using defaults"),
    }
    debug!(logging = ?config.logging, limiter = ?config.limiter, "Effective configuration");
}

/// Merge command line overrides into the configured limiter.
///
/// Choosing a different algorithm starts from that algorithm's defaults.
fn apply_overrides(limiter: LimiterConfig, args: &Args) -> LimiterConfig {
    let limiter = match (args.algorithm, &limiter) {
        (Some(Algorithm::SlidingWindow), LimiterConfig::TokenBucket { .. }) => {
            LimiterConfig::SlidingWindow {
                limit: DEFAULT_LIMIT,
                window_ms: DEFAULT_WINDOW_MS,
            }
        }
        (Some(Algorithm::TokenBucket), LimiterConfig::SlidingWindow { .. }) => {
            LimiterConfig::default()
        }
        _ => limiter,
    };

    match limiter {
        LimiterConfig::SlidingWindow { limit, window_ms } => LimiterConfig::SlidingWindow {
            limit: args.limit.unwrap_or(limit),
            window_ms: args.window_ms.unwrap_or(window_ms),
        },
        LimiterConfig::TokenBucket {
            capacity,
            refill_per_second,
        } => LimiterConfig::TokenBucket {
            capacity: args.capacity.unwrap_or(capacity),
            refill_per_second: args.refill_per_second.unwrap_or(refill_per_second),
        },
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
