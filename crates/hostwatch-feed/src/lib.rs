//! # hostwatch-feed
//!
//! Event feed sources behind one contract, [`EventSource`]:
//!
//! - [`SimulatedFeed`] - local simulator with the reference emission policy
//! - [`TailFeed`] - follows a log file, classifying lines by error patterns
//! - [`StreamFeed`] - newline-delimited JSON frames over TCP ([`wire`])
//! - [`WebhookFeed`] - HTTP listener for Nagios notifications
//!
//! Swapping one for another never touches the consumer.

pub mod error;
pub mod simulator;
pub mod source;
pub mod stream;
pub mod tail;
pub mod webhook;
pub mod wire;

use std::time::Duration;

use hostwatch_core::FeedConfig;

pub use error::{FeedError, FeedResult};
pub use simulator::{SimulatedFeed, Simulation};
pub use source::{EventSource, FeedHandle, FeedSignal, FeedSink};
pub use stream::StreamFeed;
pub use tail::TailFeed;
pub use webhook::WebhookFeed;

/// Build the source described by `config`.
pub fn from_config(config: &FeedConfig) -> Box<dyn EventSource> {
    match config {
        FeedConfig::Simulator(sim) => Box::new(SimulatedFeed::new(sim.clone())),
        FeedConfig::Tail {
            path,
            poll_interval_ms,
        } => Box::new(TailFeed::new(path, Duration::from_millis(*poll_interval_ms))),
        FeedConfig::Stream { address } => Box::new(StreamFeed::new(address)),
        FeedConfig::Webhook { bind } => Box::new(WebhookFeed::new(*bind)),
    }
}
