//! Error types for feed sources.
//!
//! Sources never return these from `attach`; they are logged and turned
//! into a single `error` status on the sink.

use std::path::PathBuf;

use hostwatch_core::HostwatchError;
use thiserror::Error;

/// Errors raised inside feed sources.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Could not connect to a stream endpoint
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not bind the webhook listener
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Read from the transport failed
    #[error("Read failed on {feed}: {source}")]
    Read {
        feed: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open a tailed file
    #[error("Failed to open {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A wire message could not be decoded
    #[error("Failed to decode feed message: {message}")]
    Decode { message: String },
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Returns true if the error means the transport is gone.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Decode { .. })
    }
}

impl From<FeedError> for HostwatchError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Connect { address, source } | FeedError::Bind { address, source } => {
                HostwatchError::FeedUnavailable {
                    feed: address,
                    message: source.to_string(),
                }
            }
            FeedError::OpenFile { path, source } => HostwatchError::FeedUnavailable {
                feed: path.display().to_string(),
                message: source.to_string(),
            },
            FeedError::Read { feed, source } => HostwatchError::FeedDropped {
                feed,
                message: source.to_string(),
            },
            FeedError::Decode { message } => HostwatchError::MalformedEvent { message },
        }
    }
}
