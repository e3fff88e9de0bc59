//! Local simulator standing in for a live monitoring feed.
//!
//! Emission policy:
//! - every `log_interval`: one info/warning/error event (70/15/15)
//! - every `alert_interval`: with `alert_probability`, one critical host-down
//!   event, attributed to nagios (`nagios_share`) or to the system
//! - after each critical event, with `recovery_probability`, a matching
//!   recovery (`UP`, info) 5–20 s later
//!
//! Recovery timers belong to the simulator, not to the attachment: detaching
//! does not cancel them, their sends simply go nowhere once the sink closes.

use std::time::Duration;

use chrono::Utc;
use hostwatch_core::{ConnectionState, Event, HostState, Level, SimulatorConfig, Source};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Instant, interval_at};
use tracing::debug;

use crate::source::{EventSource, FeedHandle, FeedSink};

/// A critical event and, if one will follow, the delay until its recovery.
#[derive(Debug, Clone)]
pub struct AlertRoll {
    pub alert: Event,
    pub recovery_after: Option<Duration>,
}

/// Pure event generator driven by a seeded RNG.
#[derive(Debug)]
pub struct Simulation {
    config: SimulatorConfig,
    rng: StdRng,
}

impl Simulation {
    /// Create a generator; a configured seed makes the sequence reproducible.
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    /// Generate the next routine log event.
    pub fn next_log(&mut self) -> Event {
        let roll: f64 = self.rng.random();
        let (level, text) = if roll < 0.70 {
            (Level::Info, "running normally")
        } else if roll < 0.85 {
            (Level::Warning, "experiencing high load")
        } else {
            (Level::Error, "showing unusual activity")
        };
        Event::new(
            level,
            format!("System {text} (log-{})", Utc::now().timestamp_millis()),
        )
    }

    /// Roll for a critical event.
    pub fn roll_alert(&mut self) -> Option<AlertRoll> {
        if self.rng.random::<f64>() >= self.config.alert_probability {
            return None;
        }

        let nagios = self.rng.random::<f64>() < self.config.nagios_share;
        let alert = if nagios && !self.config.hosts.is_empty() {
            let idx = self.rng.random_range(0..self.config.hosts.len());
            let hostname = self.config.hosts[idx].clone();
            Event::new(
                Level::Critical,
                format!("HOST NOTIFICATION: {hostname} is DOWN - Host unreachable"),
            )
            .with_source(Source::Nagios)
            .with_hostname(hostname)
        } else {
            let hostname = format!("server-{}", self.rng.random_range(0..10));
            Event::new(
                Level::Critical,
                format!("CRITICAL ALERT: host down detected on {hostname}"),
            )
            .with_source(Source::System)
            .with_hostname(hostname)
        };
        let alert = alert.with_status(HostState::Down);

        let recovery_after = if self.rng.random::<f64>() < self.config.recovery_probability {
            let min = self.config.recovery_delay_min_ms;
            let max = self.config.recovery_delay_max_ms;
            Some(Duration::from_millis(self.rng.random_range(min..=max)))
        } else {
            None
        };

        Some(AlertRoll {
            alert,
            recovery_after,
        })
    }
}

/// Build the recovery event matching a host-down alert.
pub fn recovery_for(alert: &Event) -> Event {
    let hostname = alert.hostname().unwrap_or("unknown");
    Event::new(
        Level::Info,
        format!("HOST NOTIFICATION: {hostname} is UP - Host has recovered"),
    )
    .with_id(hostwatch_core::EventId::generate("recovery"))
    .with_source(alert.source().clone())
    .with_hostname(hostname)
    .with_status(HostState::Up)
}

/// [`EventSource`] running a [`Simulation`] on tokio timers.
#[derive(Debug, Clone)]
pub struct SimulatedFeed {
    config: SimulatorConfig,
}

impl SimulatedFeed {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }
}

impl Default for SimulatedFeed {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl EventSource for SimulatedFeed {
    fn label(&self) -> String {
        "simulator".to_string()
    }

    fn attach(&mut self, sink: FeedSink) -> FeedHandle {
        let mut handle = FeedHandle::new(self.label(), sink.clone());
        sink.status(ConnectionState::Connected);

        // Two independent streams; the alert stream gets a derived seed so a
        // seeded run stays reproducible without sharing one RNG across tasks.
        let log_config = self.config.clone();
        let mut alert_config = self.config.clone();
        alert_config.seed = self.config.seed.map(|s| s.wrapping_add(1));

        let log_sink = sink.clone();
        handle.track(tokio::spawn(async move {
            let period = Duration::from_millis(log_config.log_interval_ms);
            let mut ticker = interval_at(Instant::now() + period, period);
            let mut sim = Simulation::new(log_config);
            loop {
                ticker.tick().await;
                if !log_sink.event(sim.next_log()) {
                    break;
                }
            }
        }));

        handle.track(tokio::spawn(async move {
            let period = Duration::from_millis(alert_config.alert_interval_ms);
            let mut ticker = interval_at(Instant::now() + period, period);
            let mut sim = Simulation::new(alert_config);
            loop {
                ticker.tick().await;
                let Some(roll) = sim.roll_alert() else {
                    continue;
                };
                if let Some(delay) = roll.recovery_after {
                    let recovery_sink = sink.clone();
                    let alert = roll.alert.clone();
                    // Not tracked by the handle: survives detach.
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let recovery = recovery_for(&alert);
                        debug!(host = ?alert.hostname(), "simulated recovery");
                        let _ = recovery_sink.event(recovery);
                    });
                }
                if !sink.event(roll.alert) {
                    break;
                }
            }
        }));

        handle
    }
}
