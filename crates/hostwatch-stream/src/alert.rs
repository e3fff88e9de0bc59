//! The active alert slot.
//!
//! A tagged state: [`AlertSlot::Empty`] or [`AlertSlot::Armed`] holding the
//! critical event and the expiry timer started for it. Every transition out
//! of `Armed` aborts the held timer first. Each arming gets a fresh
//! generation number and the timer carries it, so a timer that fires after
//! its alert was replaced cannot clear the newer one: [`AlertSlot::expire`]
//! only acts when the generations match.

use std::fmt;

use hostwatch_core::Event;
use serde::Serialize;
use tokio::task::JoinHandle;

/// Why the slot was emptied or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearReason {
    /// Operator dismissed it
    Dismissed,
    /// The auto-expiry timer fired
    Expired,
    /// A newer critical event took the slot
    Superseded,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearReason::Dismissed => write!(f, "dismissed"),
            ClearReason::Expired => write!(f, "expired"),
            ClearReason::Superseded => write!(f, "superseded"),
        }
    }
}

/// Pending auto-expiry for one arming of the slot.
#[derive(Debug)]
pub struct ExpiryTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl ExpiryTimer {
    pub fn new(generation: u64, task: JoinHandle<()>) -> Self {
        Self { generation, task }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn cancel(self) {
        self.task.abort();
    }
}

/// Single-slot register for the most recent critical event.
#[derive(Debug, Default)]
pub enum AlertSlot {
    #[default]
    Empty,
    Armed {
        event: Event,
        generation: u64,
        /// `None` once the controller stopped: the alert stays for
        /// inspection but no longer expires on its own.
        timer: Option<ExpiryTimer>,
    },
}

impl AlertSlot {
    /// Current occupant.
    pub fn event(&self) -> Option<&Event> {
        match self {
            AlertSlot::Empty => None,
            AlertSlot::Armed { event, .. } => Some(event),
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, AlertSlot::Armed { .. })
    }

    /// Generation of the current occupant.
    pub fn generation(&self) -> Option<u64> {
        match self {
            AlertSlot::Empty => None,
            AlertSlot::Armed { generation, .. } => Some(*generation),
        }
    }

    /// Whether an expiry timer is pending.
    pub fn has_timer(&self) -> bool {
        matches!(self, AlertSlot::Armed { timer: Some(_), .. })
    }

    /// Place `event` in the slot, cancelling the previous occupant's timer.
    ///
    /// Returns the superseded event, if any.
    pub fn arm(&mut self, event: Event, timer: ExpiryTimer) -> Option<Event> {
        let generation = timer.generation();
        let previous = self.take();
        *self = AlertSlot::Armed {
            event,
            generation,
            timer: Some(timer),
        };
        previous
    }

    /// Empty the slot, cancelling any pending timer. No-op when empty.
    pub fn clear(&mut self) -> Option<Event> {
        self.take()
    }

    /// Handle a timer firing for `generation`.
    ///
    /// Clears the slot only if that generation still occupies it; a stale
    /// timer leaves the slot as it is.
    pub fn expire(&mut self, generation: u64) -> Option<Event> {
        if self.generation() != Some(generation) {
            return None;
        }
        match std::mem::take(self) {
            AlertSlot::Armed { event, .. } => Some(event),
            AlertSlot::Empty => None,
        }
    }

    /// Cancel the pending timer but keep the occupant.
    pub fn disarm_timer(&mut self) {
        if let AlertSlot::Armed { timer, .. } = self {
            if let Some(timer) = timer.take() {
                timer.cancel();
            }
        }
    }

    fn take(&mut self) -> Option<Event> {
        match std::mem::take(self) {
            AlertSlot::Empty => None,
            AlertSlot::Armed { event, timer, .. } => {
                if let Some(timer) = timer {
                    timer.cancel();
                }
                Some(event)
            }
        }
    }
}

/// Running counts of slot transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub raised: u64,
    pub dismissed: u64,
    pub expired: u64,
    pub superseded: u64,
}

impl AlertStats {
    pub(crate) fn record_clear(&mut self, reason: ClearReason) {
        match reason {
            ClearReason::Dismissed => self.dismissed += 1,
            ClearReason::Expired => self.expired += 1,
            ClearReason::Superseded => self.superseded += 1,
        }
    }
}
