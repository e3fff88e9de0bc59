//! # hostwatch-stream
//!
//! The stream controller: single owner of the bounded event history, the
//! active alert slot and the connection status for one feed.
//!
//! ```no_run
//! use hostwatch_core::StreamConfig;
//! use hostwatch_feed::SimulatedFeed;
//! use hostwatch_stream::{StreamController, StreamUpdate};
//!
//! # async fn run() {
//! let controller = StreamController::new(SimulatedFeed::default(), &StreamConfig::default());
//! let mut updates = controller.subscribe();
//! controller.start();
//! while let Ok(update) = updates.recv().await {
//!     if let StreamUpdate::AlertRaised(event) = update {
//!         println!("ALERT {}", event.message());
//!     }
//! }
//! # }
//! ```

pub mod alert;
pub mod controller;
pub mod history;

pub use alert::{AlertSlot, AlertStats, ClearReason};
pub use controller::{StreamController, StreamUpdate};
pub use history::EventHistory;
