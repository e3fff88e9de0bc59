//! Terminal bell as a second alert channel.
//!
//! Rings on critical alerts, at most once per `min_interval`, so a burst of
//! alerts does not turn into a burst of beeps.

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use hostwatch_core::BellConfig;
use tracing::debug;

struct BellState {
    last_bell: Option<Instant>,
    out: Box<dyn Write + Send>,
}

/// Rate-limited terminal bell.
pub struct BellChannel {
    min_interval: Duration,
    state: Mutex<BellState>,
}

impl BellChannel {
    /// Bell writing to stderr.
    pub fn new(min_interval: Duration) -> Self {
        Self::with_writer(min_interval, Box::new(std::io::stderr()))
    }

    /// Bell writing to `out`.
    pub fn with_writer(min_interval: Duration, out: Box<dyn Write + Send>) -> Self {
        Self {
            min_interval,
            state: Mutex::new(BellState {
                last_bell: None,
                out,
            }),
        }
    }

    /// Build from configuration; `None` when disabled.
    pub fn from_config(config: &BellConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(Duration::from_secs(config.min_interval_secs)))
    }

    /// Ring unless the last bell was too recent. Returns whether it rang.
    pub fn ring(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(last) = state.last_bell {
            if now.duration_since(last) < self.min_interval {
                debug!("bell suppressed by rate limit");
                return false;
            }
        }
        let out = &mut state.out;
        let written = out.write_all(b"\x07").and_then(|()| out.flush());
        if let Err(e) = written {
            debug!(error = %e, "bell write failed");
            return false;
        }
        state.last_bell = Some(now);
        true
    }
}

impl std::fmt::Debug for BellChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BellChannel")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}
