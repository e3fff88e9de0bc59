//! Audio primitives and the engine seam.
//!
//! A [`SoundBuffer`] is decoded once and shared by every play. Each play is
//! a [`Voice`]: the buffer, its own envelope and pan, and a handle on the
//! process-wide [`GainStage`]. Engines mix any number of voices at once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::AudioResult;

/// Immutable mono PCM samples in `-1.0..=1.0`.
#[derive(Clone)]
pub struct SoundBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SoundBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Whether two handles share the same decoded data.
    pub fn shares_data(&self, other: &SoundBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Linearly interpolated sample at fractional `position`.
    pub fn sample_at(&self, position: f64) -> f32 {
        let index = position.floor();
        if index < 0.0 {
            return 0.0;
        }
        let i = index as usize;
        let Some(&a) = self.samples.get(i) else {
            return 0.0;
        };
        let b = self.samples.get(i + 1).copied().unwrap_or(0.0);
        let frac = (position - index) as f32;
        a + (b - a) * frac
    }
}

impl fmt::Debug for SoundBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundBuffer")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Master volume shared by every voice.
///
/// Clones share the same value, so a change applies to plays already in
/// progress.
#[derive(Debug, Clone)]
pub struct GainStage {
    bits: Arc<AtomicU32>,
}

impl GainStage {
    pub fn new(volume: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(volume.clamp(0.0, 1.0).to_bits())),
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Whether two handles drive the same stage.
    pub fn is_shared_with(&self, other: &GainStage) -> bool {
        Arc::ptr_eq(&self.bits, &other.bits)
    }
}

/// Fraction of the target gain a voice starts at.
pub const ATTACK_FLOOR: f32 = 0.4;

/// Per-play shaping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Target gain before the master stage
    pub gain: f32,
    /// Ramp from `ATTACK_FLOOR * gain` to `gain`
    pub attack: Duration,
    /// -1 left ..= 1 right
    pub pan: f32,
}

impl VoiceParams {
    /// Gain at `elapsed` into the play, before the master stage.
    pub fn envelope_at(&self, elapsed: Duration) -> f32 {
        let attack = self.attack.as_secs_f32();
        if attack <= 0.0 {
            return self.gain;
        }
        let t = (elapsed.as_secs_f32() / attack).min(1.0);
        self.gain * (ATTACK_FLOOR + (1.0 - ATTACK_FLOOR) * t)
    }

    /// Equal-power left/right gains for `pan`.
    pub fn pan_gains(&self) -> (f32, f32) {
        let angle = (self.pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
        (angle.cos(), angle.sin())
    }
}

/// One independent play of a buffer.
#[derive(Debug, Clone)]
pub struct Voice {
    buffer: SoundBuffer,
    params: VoiceParams,
    master: GainStage,
    position: f64,
}

impl Voice {
    pub fn new(buffer: SoundBuffer, params: VoiceParams, master: GainStage) -> Self {
        Self {
            buffer,
            params,
            master,
            position: 0.0,
        }
    }

    pub fn buffer(&self) -> &SoundBuffer {
        &self.buffer
    }

    pub fn params(&self) -> &VoiceParams {
        &self.params
    }

    pub fn master(&self) -> &GainStage {
        &self.master
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.buffer.len() as f64
    }

    /// Add this voice into an interleaved `out` frame buffer at
    /// `output_rate`. Returns false once the buffer is exhausted.
    pub fn mix_into(&mut self, out: &mut [f32], channels: usize, output_rate: u32) -> bool {
        let channels = channels.max(1);
        let step = self.buffer.sample_rate() as f64 / output_rate.max(1) as f64;
        let (left, right) = self.params.pan_gains();
        let master = self.master.volume();

        for frame in out.chunks_mut(channels) {
            if self.is_finished() {
                return false;
            }
            let elapsed = Duration::from_secs_f64(self.position / self.buffer.sample_rate() as f64);
            let sample = self.buffer.sample_at(self.position) * self.params.envelope_at(elapsed) * master;
            match frame {
                [mono] => *mono += sample,
                [l, r, ..] => {
                    *l += sample * left;
                    *r += sample * right;
                }
                [] => {}
            }
            self.position += step;
        }
        !self.is_finished()
    }
}

/// Run state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// Output paused by the host; plays are silent until resumed
    Suspended,
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Running => write!(f, "running"),
            EngineState::Suspended => write!(f, "suspended"),
            EngineState::Closed => write!(f, "closed"),
        }
    }
}

/// An open audio output able to mix concurrent voices.
pub trait AudioEngine: Send + Sync {
    fn state(&self) -> EngineState;

    /// Try to bring a suspended engine back to running.
    fn resume(&self) -> AudioResult<()>;

    /// Output sample rate.
    fn sample_rate(&self) -> u32;

    /// Start a voice; returns immediately.
    fn play(&self, voice: Voice) -> AudioResult<()>;
}

/// Factory for the audio engine, called once on first demand.
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> AudioResult<Arc<dyn AudioEngine>>;
}

/// Backend that never produces sound; plays are logged and counted.
#[derive(Debug, Default)]
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn name(&self) -> &str {
        "silent"
    }

    fn open(&self) -> AudioResult<Arc<dyn AudioEngine>> {
        Ok(Arc::new(SilentEngine::default()))
    }
}

/// Engine behind [`SilentBackend`].
#[derive(Debug, Default)]
pub struct SilentEngine {
    plays: AtomicUsize,
}

impl SilentEngine {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::Relaxed)
    }
}

impl AudioEngine for SilentEngine {
    fn state(&self) -> EngineState {
        EngineState::Running
    }

    fn resume(&self) -> AudioResult<()> {
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn play(&self, voice: Voice) -> AudioResult<()> {
        self.plays.fetch_add(1, Ordering::Relaxed);
        debug!(
            gain = voice.params().gain,
            pan = voice.params().pan,
            duration_ms = voice.buffer().duration().as_millis() as u64,
            "silent play"
        );
        Ok(())
    }
}
