//! The notifier: turns alert arrivals into sound.
//!
//! Audio resources (engine, decoded buffer, master gain) are created once,
//! on the first successful [`Notifier::ensure_ready`], and shared by every
//! later play. A missing or undecodable asset is replaced by the
//! synthesized tone. Nothing here returns an error to the caller of
//! [`Notifier::notify`]: failures are logged and the play is skipped.

use std::sync::Arc;
use std::time::Duration;

use hostwatch_core::{Event, SoundConfig, Source};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::asset::AssetLoader;
use crate::audio::{AudioBackend, AudioEngine, EngineState, GainStage, SoundBuffer, Voice, VoiceParams};
use crate::error::AudioResult;
use crate::tone::fallback_tone;
use crate::decode::{asset_extension, decode_sound};

/// How insistent a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    Normal,
    /// Loudest, and replayed at each repeat offset
    High,
}

impl Urgency {
    /// Nagios host notifications outrank generic system alerts.
    pub fn for_event(event: &Event) -> Self {
        match event.source() {
            Source::Nagios => Urgency::High,
            _ => Urgency::Normal,
        }
    }

    /// Voice gain before the master stage.
    pub fn gain(self) -> f32 {
        match self {
            Urgency::Normal => 0.7,
            Urgency::High => 1.0,
        }
    }

    pub fn repeats(self) -> bool {
        matches!(self, Urgency::High)
    }
}

/// Playback shaping taken from the sound configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifierSettings {
    pub asset: String,
    pub volume: f32,
    pub pan: f32,
    pub attack: Duration,
    pub repeat_offsets: Vec<Duration>,
}

impl From<&SoundConfig> for NotifierSettings {
    fn from(config: &SoundConfig) -> Self {
        Self {
            asset: config.asset.clone(),
            volume: config.volume,
            pan: config.pan,
            attack: Duration::from_millis(config.attack_ms),
            repeat_offsets: config
                .repeat_offsets_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self::from(&SoundConfig::default())
    }
}

/// Where the loaded sound came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundOrigin {
    Asset,
    Fallback,
}

/// Audio state shared by every play.
pub struct AudioResources {
    engine: Arc<dyn AudioEngine>,
    buffer: SoundBuffer,
    master: GainStage,
    origin: SoundOrigin,
}

impl AudioResources {
    pub fn buffer(&self) -> &SoundBuffer {
        &self.buffer
    }

    pub fn master(&self) -> &GainStage {
        &self.master
    }

    pub fn origin(&self) -> SoundOrigin {
        self.origin
    }

    fn voice(&self, params: VoiceParams) -> Voice {
        Voice::new(self.buffer.clone(), params, self.master.clone())
    }
}

/// Resume a suspended engine, then start `voice`. Failures are logged.
fn play_now(engine: &dyn AudioEngine, voice: Voice) {
    if engine.state() == EngineState::Suspended {
        match engine.resume() {
            Ok(()) => debug!("audio engine resumed"),
            Err(e) => {
                warn!(error = %e, "audio engine suspended and resume failed, skipping play");
                return;
            }
        }
    }
    if let Err(e) = engine.play(voice) {
        warn!(error = %e, "alert sound failed to play");
    }
}

/// Audible alert channel.
pub struct Notifier {
    backend: Arc<dyn AudioBackend>,
    loader: Arc<dyn AssetLoader>,
    settings: NotifierSettings,
    resources: OnceCell<AudioResources>,
}

impl Notifier {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        loader: Arc<dyn AssetLoader>,
        settings: NotifierSettings,
    ) -> Self {
        Self {
            backend,
            loader,
            settings,
            resources: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &NotifierSettings {
        &self.settings
    }

    /// Open the engine and load the sound, once.
    ///
    /// Later calls return immediately. An asset that cannot be fetched or
    /// decoded is replaced by the fallback tone. Returns false, after
    /// logging, only when no engine could be opened; a later call retries.
    pub async fn ensure_ready(&self) -> bool {
        match self.resources.get_or_try_init(|| self.initialize()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "audio initialization failed");
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.resources.initialized()
    }

    /// Resources, once ready.
    pub fn resources(&self) -> Option<&AudioResources> {
        self.resources.get()
    }

    async fn initialize(&self) -> AudioResult<AudioResources> {
        let engine = self.backend.open()?;
        let (buffer, origin) = match self.load_asset().await {
            Ok(buffer) => (buffer, SoundOrigin::Asset),
            Err(e) => {
                warn!(
                    asset = %self.settings.asset,
                    error = %e,
                    "alert sound unusable, using synthesized tone"
                );
                (fallback_tone(engine.sample_rate()), SoundOrigin::Fallback)
            }
        };
        info!(
            backend = self.backend.name(),
            origin = ?origin,
            duration_ms = buffer.duration().as_millis() as u64,
            "audio ready"
        );
        Ok(AudioResources {
            engine,
            buffer,
            master: GainStage::new(self.settings.volume),
            origin,
        })
    }

    async fn load_asset(&self) -> AudioResult<SoundBuffer> {
        let bytes = self.loader.fetch(&self.settings.asset).await?;
        decode_sound(&bytes, asset_extension(&self.settings.asset))
    }

    fn params(&self, urgency: Urgency) -> VoiceParams {
        VoiceParams {
            gain: urgency.gain(),
            attack: self.settings.attack,
            pan: self.settings.pan,
        }
    }

    /// Play the alert sound at `urgency`.
    ///
    /// Returns immediately. High urgency schedules a replay at each repeat
    /// offset, which needs a tokio runtime. Before readiness this only logs.
    pub fn notify(&self, urgency: Urgency) {
        let Some(resources) = self.resources.get() else {
            warn!(urgency = ?urgency, "notify before audio is ready, ignoring");
            return;
        };
        let params = self.params(urgency);
        debug!(urgency = ?urgency, gain = params.gain, "playing alert sound");
        play_now(resources.engine.as_ref(), resources.voice(params));

        if !urgency.repeats() {
            return;
        }
        for &offset in &self.settings.repeat_offsets {
            let engine = Arc::clone(&resources.engine);
            let voice = resources.voice(params);
            tokio::spawn(async move {
                tokio::time::sleep(offset).await;
                play_now(engine.as_ref(), voice);
            });
        }
    }

    /// Play the sound for `event` at the urgency its source implies.
    pub fn notify_event(&self, event: &Event) {
        self.notify(Urgency::for_event(event));
    }

    /// Change the master volume for current and future plays.
    pub fn set_volume(&self, volume: f32) {
        if let Some(resources) = self.resources.get() {
            resources.master.set_volume(volume);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("backend", &self.backend.name())
            .field("ready", &self.is_ready())
            .field("settings", &self.settings)
            .finish()
    }
}
