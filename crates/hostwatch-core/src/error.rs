//! Error types for hostwatch operations.
//!
//! [`HostwatchError`] is the workspace-wide error. Feed and audio crates keep
//! their own narrower enums and convert into this one at crate boundaries.
//! Transport and audio failures are never fatal to the stream: the
//! controller degrades to an `error` status and the notifier to a
//! synthesized tone, so most variants here end up in logs, not in exits.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`HostwatchError`].
pub type Result<T> = std::result::Result<T, HostwatchError>;

/// Error type for all hostwatch operations.
#[derive(Debug, Error)]
pub enum HostwatchError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Feed specification could not be parsed
    #[error("Invalid feed specification '{spec}': {message}")]
    FeedSpec { spec: String, message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// JSON parsing error
    #[error("JSON parse error in {context}: {message}")]
    JsonParse {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Event could not be mapped onto the event shape (non-fatal, skipped)
    #[error("Malformed event: {message}")]
    MalformedEvent { message: String },

    // =========================================================================
    // Feed Errors
    // =========================================================================
    /// Feed transport could not be reached
    #[error("Feed {feed} unavailable: {message}")]
    FeedUnavailable { feed: String, message: String },

    /// Feed transport dropped mid-stream
    #[error("Feed {feed} dropped: {message}")]
    FeedDropped { feed: String, message: String },

    // =========================================================================
    // Audio Errors
    // =========================================================================
    /// No audio output could be opened
    #[error("Audio output unavailable: {message}")]
    AudioUnavailable { message: String },

    /// Sound asset could not be fetched
    #[error("Failed to fetch sound asset {location}: {message}")]
    AssetFetch { location: String, message: String },

    /// Sound asset could not be decoded
    #[error("Failed to decode sound asset: {message}")]
    AudioDecode { message: String },

    /// Playback attempt failed
    #[error("Playback failed: {message}")]
    Playback { message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in hostwatch)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl HostwatchError {
    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a JSON parse error
    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a configuration validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a feed unavailable error
    pub fn feed_unavailable(feed: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FeedUnavailable {
            feed: feed.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the user can retry (restart the feed, replug audio)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable { .. }
                | Self::FeedDropped { .. }
                | Self::AudioUnavailable { .. }
                | Self::Playback { .. }
                | Self::MalformedEvent { .. }
        )
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigValidation { .. }
                | Self::FeedSpec { .. }
        )
    }

    /// Returns true if this error belongs to the audio path
    pub fn is_audio_error(&self) -> bool {
        matches!(
            self,
            Self::AudioUnavailable { .. }
                | Self::AssetFetch { .. }
                | Self::AudioDecode { .. }
                | Self::Playback { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => Some("Pass --config or create ~/.hostwatch/config.yaml"),
            Self::ConfigInvalid { .. } => Some("Check YAML syntax in the configuration file"),
            Self::FeedSpec { .. } => {
                Some("Use simulator, tail:PATH, tcp://HOST:PORT or webhook:ADDR")
            }
            Self::FeedUnavailable { .. } => Some("Check that the feed endpoint is reachable, then restart"),
            Self::AudioUnavailable { .. } => Some("Run with --mute or check the default output device"),
            Self::AssetFetch { .. } | Self::AudioDecode { .. } => {
                Some("A synthesized tone is used instead; provide a PCM WAV asset to customize")
            }
            _ => None,
        }
    }
}
