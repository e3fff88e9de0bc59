//! # hostwatch-core
//!
//! Core types, errors, logging and configuration shared by the hostwatch
//! crates.
//!
//! - [`HostwatchError`] - error type for all hostwatch operations
//! - [`logging`] - tracing setup
//! - [`types`] - the [`Event`] model and connection status
//! - [`config`] - YAML configuration with reference defaults
//!
//! ## Example
//!
//! ```no_run
//! use hostwatch_core::{HostwatchConfig, logging};
//!
//! fn main() -> hostwatch_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!     let config = HostwatchConfig::load(None)?;
//!     tracing::info!(feed = %config.feed.label(), "configured");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    BellConfig, FeedConfig, HostwatchConfig, SimulatorConfig, SoundConfig, StreamConfig,
};
pub use error::{HostwatchError, Result};
pub use logging::{LogGuard, init_logging};
pub use types::{ConnectionState, ConnectionStatus, Event, EventId, HostState, Level, Source};
