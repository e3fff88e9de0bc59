//! Synthesized fallback tone.
//!
//! Used whenever the configured asset cannot be fetched or decoded, so an
//! alert is never silent for lack of a sound file. Fully deterministic: the
//! same sample rate always yields the same samples.

use std::f32::consts::TAU;
use std::time::Duration;

use crate::audio::SoundBuffer;

/// Tone frequency.
pub const TONE_FREQUENCY_HZ: f32 = 880.0;

/// Tone length.
pub const TONE_DURATION: Duration = Duration::from_millis(600);

/// Linear fade-in at the start of the tone.
pub const TONE_ATTACK: Duration = Duration::from_millis(10);

/// Peak amplitude.
const TONE_PEAK: f32 = 0.8;

/// Exponential decay rate (per second) after the attack.
const TONE_DECAY_PER_SEC: f32 = 6.0;

/// Render the fallback tone at `sample_rate`.
pub fn fallback_tone(sample_rate: u32) -> SoundBuffer {
    let rate = sample_rate.max(1) as f32;
    let len = (TONE_DURATION.as_secs_f32() * rate).round() as usize;
    let attack = TONE_ATTACK.as_secs_f32();

    let samples = (0..len)
        .map(|n| {
            let t = n as f32 / rate;
            let envelope = if t < attack {
                t / attack
            } else {
                (-(t - attack) * TONE_DECAY_PER_SEC).exp()
            };
            TONE_PEAK * envelope * (TAU * TONE_FREQUENCY_HZ * t).sin()
        })
        .collect();
    SoundBuffer::new(samples, sample_rate)
}
