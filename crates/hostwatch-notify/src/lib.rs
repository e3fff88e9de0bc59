//! # hostwatch-notify
//!
//! Audible alert notifications.
//!
//! - [`Notifier`] - lazy audio setup, fallback tone, urgency shaping
//! - [`audio`] - sound buffers, voices, the [`AudioEngine`]/[`AudioBackend`] seam
//! - [`decode`] / [`wav`] - asset decoding (WAV natively, MP3 and others via symphonia)
//! - [`tone`] - the synthesized fallback
//! - [`BellChannel`] - terminal bell as a second channel
//! - [`spawn_alert_listener`] - plays on every raised alert
//!
//! Real output needs the `playback` feature (cpal). Without it, or with
//! sound disabled, [`SilentBackend`] stands in and plays are only logged.

pub mod asset;
pub mod audio;
pub mod bell;
pub mod decode;
#[cfg(feature = "playback")]
pub mod cpal_output;
pub mod error;
pub mod listener;
pub mod mixer;
pub mod notifier;
pub mod tone;
pub mod wav;

use std::sync::Arc;

use hostwatch_core::SoundConfig;
use tracing::info;

pub use asset::{AssetLoader, DefaultAssetLoader};
pub use audio::{
    AudioBackend, AudioEngine, EngineState, GainStage, SilentBackend, SoundBuffer, Voice, VoiceParams,
};
pub use bell::BellChannel;
pub use decode::decode_sound;
#[cfg(feature = "playback")]
pub use cpal_output::CpalBackend;
pub use error::{AudioError, AudioResult};
pub use listener::spawn_alert_listener;
pub use notifier::{Notifier, NotifierSettings, SoundOrigin, Urgency};

/// Backend matching `config` and the enabled features.
pub fn backend_for(config: &SoundConfig) -> Arc<dyn AudioBackend> {
    if !config.enabled {
        info!("sound disabled, alerts will be silent");
        return Arc::new(SilentBackend);
    }
    output_backend()
}

#[cfg(feature = "playback")]
fn output_backend() -> Arc<dyn AudioBackend> {
    Arc::new(CpalBackend::new())
}

#[cfg(not(feature = "playback"))]
fn output_backend() -> Arc<dyn AudioBackend> {
    info!("built without the playback feature, alerts will be silent");
    Arc::new(SilentBackend)
}

/// Notifier with the default asset loader and the backend for `config`.
pub fn notifier_from_config(config: &SoundConfig) -> AudioResult<Notifier> {
    Ok(Notifier::new(
        backend_for(config),
        Arc::new(DefaultAssetLoader::new()?),
        NotifierSettings::from(config),
    ))
}
