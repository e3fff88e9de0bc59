//! hostwatch - live log stream and host-down siren
//!
//! Follows a feed of host monitoring events, keeps the most recent ones,
//! raises an alert on every critical event and plays the alert sound.
//!
//! ## Usage
//!
//! ```bash
//! # Simulated feed with default settings
//! hostwatch
//!
//! # Follow a log file, verbose logging
//! hostwatch -v --feed tail:/var/log/mylog.log
//!
//! # Accept Nagios webhooks, no sound
//! hostwatch --feed webhook:0.0.0.0:5000 --mute
//!
//! # Reproducible simulator run
//! hostwatch --seed 42
//! ```
//!
//! While running, Enter dismisses the active alert, `h` prints the history,
//! `s` prints status, `r` reattaches the feed and `q` quits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hostwatch_core::{
    ConnectionState, FeedConfig, HostwatchConfig, Level, LogGuard, init_logging,
};
use hostwatch_notify::{BellChannel, Notifier, spawn_alert_listener};
use hostwatch_stream::{StreamController, StreamUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

/// Live log stream and host-down siren
#[derive(Parser, Debug)]
#[command(name = "hostwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.hostwatch/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.hostwatch/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feed to follow: simulator, tail:PATH, tcp://HOST:PORT, webhook:ADDR
    #[arg(short, long)]
    feed: Option<FeedConfig>,

    /// Disable the alert sound
    #[arg(long)]
    mute: bool,

    /// Seed for the simulated feed
    #[arg(long)]
    seed: Option<u64>,

    /// Only print events at or above this level (info, warning, error, critical)
    #[arg(long, value_parser = parse_level)]
    min_level: Option<Level>,
}

fn parse_level(s: &str) -> Result<Level, String> {
    Level::parse(s).ok_or_else(|| format!("unknown level '{s}'"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    let result = load_config(&cli).and_then(|config| {
        let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
        let result = runtime.block_on(run(config, cli.min_level));
        // the stdin reader sits on a blocking thread that never returns
        runtime.shutdown_background();
        result
    });

    match result {
        Ok(()) => {
            info!("hostwatch exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("hostwatch error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn setup_logging(cli: &Cli) -> hostwatch_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

/// Configuration file plus command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<HostwatchConfig> {
    let mut config =
        HostwatchConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(feed) = &cli.feed {
        config = config.with_feed(feed.clone());
    }
    if let Some(seed) = cli.seed {
        match &mut config.feed {
            FeedConfig::Simulator(sim) => sim.seed = Some(seed),
            other => warn!(feed = %other.label(), "--seed only applies to the simulator"),
        }
    }
    if cli.mute {
        config = config.muted();
    }
    Ok(config)
}

async fn run(config: HostwatchConfig, min_level: Option<Level>) -> anyhow::Result<()> {
    info!(feed = %config.feed.label(), "starting hostwatch");

    let source = hostwatch_feed::from_config(&config.feed);
    let controller = StreamController::new(source, &config.stream);

    let notifier = Arc::new(
        hostwatch_notify::notifier_from_config(&config.sound).context("setting up audio")?,
    );
    if !notifier.ensure_ready().await {
        warn!("audio unavailable, alerts will not make a sound");
    }
    let bell = BellChannel::from_config(&config.sound.bell);
    let listener = spawn_alert_listener(controller.subscribe(), Arc::clone(&notifier), bell);
    let console = tokio::spawn(print_updates(controller.subscribe(), min_level.unwrap_or_default()));

    controller.start();
    print_status(&controller);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_command(line.trim(), &controller, &notifier) {
                        break;
                    }
                }
                // stdin closed: keep running until interrupted
                Ok(None) => {
                    tokio::signal::ctrl_c().await.context("waiting for interrupt")?;
                    break;
                }
                Err(e) => return Err(e).context("reading commands"),
            },
        }
    }

    info!("shutting down");
    controller.stop();
    let stats = controller.alert_stats();
    info!(
        raised = stats.raised,
        dismissed = stats.dismissed,
        expired = stats.expired,
        superseded = stats.superseded,
        dropped = controller.dropped_count(),
        "session summary"
    );
    drop(controller);
    let _ = listener.await;
    let _ = console.await;
    Ok(())
}

/// Handle one line of keyboard input. Returns false to quit.
fn handle_command(command: &str, controller: &StreamController, notifier: &Notifier) -> bool {
    match command {
        "" | "d" => controller.dismiss_alert(),
        "h" => {
            for event in controller.history() {
                println!("{}", event.format_display());
            }
        }
        "s" => print_status(controller),
        "r" => {
            controller.start();
            print_status(controller);
        }
        "t" => notifier.notify(hostwatch_notify::Urgency::Normal),
        "q" => return false,
        other => println!("unknown command '{other}' (enter, h, s, r, t, q)"),
    }
    true
}

fn print_status(controller: &StreamController) {
    let status = controller.status();
    println!(
        "{} {} ({}) since {}",
        status.status.indicator(),
        status.status,
        controller.source_label(),
        status.last_update.format("%H:%M:%S")
    );
    if let Some(alert) = controller.active_alert() {
        println!("active alert: {}", alert.message());
    }
}

/// Print controller updates to stdout.
async fn print_updates(mut updates: broadcast::Receiver<StreamUpdate>, min_level: Level) {
    loop {
        match updates.recv().await {
            Ok(StreamUpdate::EventAppended(event)) => {
                if event.level() >= min_level {
                    println!("{}", event.format_display());
                }
            }
            Ok(StreamUpdate::AlertRaised(event)) => {
                println!("\n*** ALERT *** {}  [enter to dismiss]\n", event.message());
            }
            Ok(StreamUpdate::AlertCleared { event, reason }) => {
                println!("alert {}: {}", reason, event.message());
            }
            Ok(StreamUpdate::StatusChanged(status)) => {
                println!("{} {}", status.status.indicator(), status.status);
                if status.status == ConnectionState::Error {
                    println!("feed error, press r to reconnect");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console fell behind, some updates not shown");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "hostwatch",
            "--config",
            "/nonexistent/hostwatch.yaml",
            "--feed",
            "tcp://127.0.0.1:9000",
            "--min-level",
            "warn",
        ]);
        assert_eq!(
            cli.feed,
            Some(FeedConfig::Stream {
                address: "127.0.0.1:9000".to_string()
            })
        );
        assert_eq!(cli.min_level, Some(Level::Warning));
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_bad_feed_rejected() {
        assert!(Cli::try_parse_from(["hostwatch", "--feed", "ftp://x"]).is_err());
    }
}
