//! MarketPulse — multi-source financial metrics poller.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! seeds default settings on first run, and drives the recurring
//! fetch cycle with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use marketpulse::config::HostConfig;
use marketpulse::engine::cycle::CycleStatus;
use marketpulse::engine::scheduler::Scheduler;
use marketpulse::net::{HttpTransport, RetryPolicy, Transport};
use marketpulse::storage::FileStore;
use marketpulse::types::{Settings, MAX_UPDATE_FREQUENCY, MIN_UPDATE_FREQUENCY};

const BANNER: &str = r#"
 __  __            _        _   ____        _
|  \/  | __ _ _ __| | _____| |_|  _ \ _   _| |___  ___
| |\/| |/ _` | '__| |/ / _ \ __| |_) | | | | / __|/ _ \
| |  | | (_| | |  |   <  __/ |_|  __/| |_| | \__ \  __/
|_|  |_|\__,_|_|  |_|\_\___|\__|_|    \__,_|_|___/\___|

  Multi-source financial metrics poller
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = HostConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        state_path = %cfg.state_path,
        timeout_ms = cfg.request_timeout_ms,
        "MarketPulse starting up"
    );

    let storage = Arc::new(FileStore::new(&cfg.state_path));
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        Duration::from_millis(cfg.request_timeout_ms),
        RetryPolicy {
            max_retries: cfg.retry.max_retries,
            initial_delay: Duration::from_millis(cfg.retry.initial_delay_ms),
            backoff_multiplier: cfg.retry.backoff_multiplier,
        },
    )?);
    let scheduler = Scheduler::new(storage, transport);

    // Seed defaults (keys come from the environment) and run the first
    // cycle immediately.
    let mut defaults = Settings::default();
    defaults.api_keys.finnhub = HostConfig::resolve_env(&cfg.keys.finnhub_key_env);
    defaults.api_keys.fred = HostConfig::resolve_env(&cfg.keys.fred_key_env);
    let mut frequency = scheduler.on_install(defaults).await?;

    let mut interval = tick_interval(frequency);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        frequency_minutes = frequency,
        "Entering polling loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let CycleStatus::FatallyFailed(message) = scheduler.on_schedule().await {
                    error!(error = %message, "Cycle failed fatally — continuing to next");
                }

                // Settings edits land in storage out of band; pick up a
                // changed interval on the next tick.
                let current = scheduler.current_frequency();
                if current != frequency {
                    info!(
                        old_minutes = frequency,
                        new_minutes = current,
                        "Polling frequency changed, rescheduling"
                    );
                    frequency = current;
                    interval = tick_interval(frequency);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("MarketPulse shut down cleanly.");
    Ok(())
}

fn tick_interval(frequency_minutes: u32) -> tokio::time::Interval {
    // tokio::time::interval panics on a zero period.
    let minutes = frequency_minutes.clamp(MIN_UPDATE_FREQUENCY, MAX_UPDATE_FREQUENCY);
    let period = Duration::from_secs(u64::from(minutes) * 60);
    let mut interval = tokio::time::interval(period);
    // The immediate first cycle already ran; skip the tick at t=0.
    interval.reset();
    interval
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("marketpulse=info"));

    let json_logging = std::env::var("MARKETPULSE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}
