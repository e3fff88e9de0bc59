//! Error types for the notifier.
//!
//! None of these reach the caller of `notify`: asset failures fall back to
//! the synthesized tone and playback failures are logged per attempt.

use hostwatch_core::HostwatchError;
use thiserror::Error;

/// Errors raised by audio backends, asset loading and decoding.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No output device or engine could be opened
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),

    /// The sound asset could not be fetched
    #[error("Failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },

    /// The sound asset is in no format we can decode
    #[error("Failed to decode sound: {0}")]
    Decode(String),

    /// The engine is suspended and could not be resumed
    #[error("Audio engine suspended: {0}")]
    Suspended(String),

    /// A play attempt failed
    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

impl AudioError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a fetch error
    pub fn fetch(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if the fallback tone should replace the asset.
    pub fn wants_fallback(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Decode(_))
    }
}

impl From<AudioError> for HostwatchError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Unavailable(message) => HostwatchError::AudioUnavailable { message },
            AudioError::Fetch { location, message } => {
                HostwatchError::AssetFetch { location, message }
            }
            AudioError::Decode(message) => HostwatchError::AudioDecode { message },
            AudioError::Suspended(message) | AudioError::Playback(message) => {
                HostwatchError::Playback { message }
            }
        }
    }
}
