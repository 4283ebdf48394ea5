//! sitewatch CLI
//!
//! Local execution entry point for one-off checks and continuous watching.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sitewatch::{
    error::{AppError, Result},
    models::{Config, MonitoredTarget},
    notify::{self, NoopNotifier, NotificationGateway},
    pipeline::{
        CheckContext, CheckReport, Scheduler, SchedulerEvent, WatchState, WatchSummary, run_check,
    },
    services::{ContentFetcher, detector},
    storage::CacheStore,
};
use tokio::sync::{Mutex, mpsc, watch};

/// Graphemes of diff shown inline in watch output.
const DIFF_PREVIEW_LEN: usize = 200;

/// sitewatch - Website Change Watcher
#[derive(Parser, Debug)]
#[command(
    name = "sitewatch",
    version,
    about = "Watches web pages and reports content changes"
)]

struct Cli {
    /// Path to the TOML application config
    #[arg(short, long, default_value = "sitewatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch one URL or a JSON targets file until interrupted
    Watch {
        /// URL to watch, or path to a JSON targets file
        target: String,

        /// Check interval in seconds when watching a single URL
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Send notifications for changes, outages, and recoveries
        #[arg(long)]
        notify: bool,

        /// Only report changes and failures, not routine progress
        #[arg(long)]
        quiet: bool,
    },

    /// Check a single URL once and report
    Check {
        /// URL to check
        url: String,

        /// Send notifications for changes, outages, and recoveries
        #[arg(long)]
        notify: bool,
    },

    /// Validate configuration files
    Validate {
        /// Targets file to validate alongside the app config
        #[arg(long)]
        targets: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Interpret the watch argument as a URL or as a JSON targets file.
///
/// A missing `.json` path gets a sample file written for it; `None` then
/// means there is nothing to watch yet. Anything that is neither an http(s)
/// URL nor a `.json` path is rejected rather than guessed at.
fn resolve_targets(target: &str, interval: u64) -> Result<Option<Vec<MonitoredTarget>>> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(Some(vec![MonitoredTarget::new(target, interval)]));
    }

    let path = PathBuf::from(target);
    if path.exists() {
        return Ok(Some(MonitoredTarget::load_all(&path)?));
    }
    if target.ends_with(".json") {
        MonitoredTarget::write_sample(&path)?;
        log::info!("Created sample targets file at {}", path.display());
        log::info!("Edit it and run again to start watching.");
        return Ok(None);
    }

    Err(AppError::config(format!(
        "{} is neither an http(s) URL nor a .json targets file",
        target
    )))
}

/// Assemble the shared check context from the app config.
async fn build_context(config: &Config, with_notifications: bool) -> Result<CheckContext> {
    let store = CacheStore::load(&config.scheduler.cache_file).await;
    if !store.is_empty() {
        log::info!("Loaded {} cached snapshot(s)", store.len());
    }

    let gateway: Arc<dyn NotificationGateway> = if with_notifications {
        let gateway = notify::build_gateway(&config.notify)?;
        if !gateway.is_configured() {
            log::warn!(
                "Notifications requested but no backend is configured; continuing without them"
            );
        }
        gateway
    } else {
        Arc::new(NoopNotifier)
    };

    Ok(CheckContext {
        fetcher: ContentFetcher::new(&config.fetch)?,
        state: Arc::new(Mutex::new(WatchState::new(store))),
        gateway,
        max_message_len: config.notify.max_message_len,
    })
}

/// Full diff for single checks, a bounded preview inside the watch loop.
fn diff_text(diff: &str, preview: Option<usize>) -> String {
    match preview {
        Some(max) => notify::truncate_message(diff, max),
        None => diff.to_string(),
    }
}

fn print_report(url: &str, report: &CheckReport, quiet: bool, preview: Option<usize>) {
    match report {
        CheckReport::FirstSeen => {
            log::info!("✱ {}: {}", url, detector::FIRST_CHECK_MESSAGE);
        }
        CheckReport::Unchanged => {
            if !quiet {
                log::info!("✓ {}: no changes", url);
            }
        }
        CheckReport::Changed { diff } => {
            log::info!("✱ {}: changes detected", url);
            for line in diff_text(diff, preview).lines() {
                log::info!("    {}", line);
            }
        }
        CheckReport::Unreachable { error, attempts } => {
            log::warn!("✗ {}: {} ({} attempt(s))", url, error, attempts);
        }
    }
}

/// Drain scheduler events into log lines until the scheduler stops.
async fn print_events(mut events: mpsc::UnboundedReceiver<SchedulerEvent>, quiet: bool) {
    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::BatchStarted { count } => {
                if !quiet {
                    log::info!("Checking {} due target(s)...", count);
                }
            }
            SchedulerEvent::CheckCompleted { url, report } => {
                print_report(&url, &report, quiet, Some(DIFF_PREVIEW_LEN))
            }
            SchedulerEvent::Sleeping { duration, next_url } => {
                if !quiet {
                    log::info!("Next check in {}s ({})", duration.as_secs(), next_url);
                }
            }
        }
    }
}

fn print_summary(summary: &WatchSummary) {
    log::info!("Watch summary:");
    for target in &summary.targets {
        let last_change = target
            .last_changed
            .map_or_else(|| "never".to_string(), |ts| {
                ts.format("%Y-%m-%d %H:%M:%S").to_string()
            });
        let state = if target.unreachable {
            " [unreachable]"
        } else {
            ""
        };
        log::info!(
            "  {}: {} check(s), last change {}{}",
            target.url,
            target.check_count,
            last_change,
            state
        );
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("sitewatch starting...");

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Watch {
            target,
            interval,
            notify: with_notifications,
            quiet,
        } => {
            config.validate()?;

            let Some(targets) = resolve_targets(&target, interval)? else {
                return Ok(());
            };

            log::info!("Watching {} target(s):", targets.len());
            for target in &targets {
                let min = (target.interval as f64 * 0.8) as u64;
                let max = (target.interval as f64 * 1.2) as u64;
                log::info!(
                    "  {} every {}s (randomized {}-{}s)",
                    target.url,
                    target.interval,
                    min,
                    max
                );
            }
            log::info!("Intervals are re-randomized within ±20% after every check.");
            log::info!("Press Ctrl+C to stop.");

            let ctx = build_context(&config, with_notifications).await?;

            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let scheduler = Scheduler::new(targets, ctx, config.scheduler.max_concurrent)
                .with_events(event_tx);
            let printer = tokio::spawn(print_events(event_rx, quiet));

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, finishing checks in flight...");
                    let _ = shutdown_tx.send(true);
                }
            });

            let summary = scheduler.run(shutdown_rx).await;
            let _ = printer.await;

            print_summary(&summary);
        }

        Command::Check {
            url,
            notify: with_notifications,
        } => {
            config.validate()?;

            let ctx = build_context(&config, with_notifications).await?;

            log::info!("Checking {}...", url);
            let report = run_check(&ctx, &url).await;
            print_report(&url, &report, false, None);
        }

        Command::Validate { targets } => {
            log::info!("Validating configuration...");

            let strict = if cli.config.exists() {
                Config::load(&cli.config)?
            } else {
                log::info!(
                    "No config file at {}; validating defaults",
                    cli.config.display()
                );
                Config::default()
            };

            if let Err(e) = strict.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ App config OK");

            if let Some(path) = targets {
                let loaded = MonitoredTarget::load_all(&path)?;
                log::info!("✓ Targets OK ({} target(s))", loaded.len());
            }

            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
