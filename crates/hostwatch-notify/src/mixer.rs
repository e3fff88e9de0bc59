//! Voice mixer driven by an output callback.

use crate::audio::Voice;

/// Sums active voices into interleaved output frames.
#[derive(Debug)]
pub struct Mixer {
    voices: Vec<Voice>,
    channels: usize,
    sample_rate: u32,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            voices: Vec::new(),
            channels: channels.max(1) as usize,
            sample_rate,
            scratch: Vec::new(),
        }
    }

    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    /// Voices still playing.
    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Fill `out` with the next frames; finished voices are dropped.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let (channels, rate) = (self.channels, self.sample_rate);
        self.voices.retain_mut(|voice| voice.mix_into(out, channels, rate));
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Render into a sample type other than `f32`.
    pub fn render_with<T>(&mut self, out: &mut [T], convert: impl Fn(f32) -> T) {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(out.len(), 0.0);
        self.render(&mut scratch);
        for (dst, &src) in out.iter_mut().zip(scratch.iter()) {
            *dst = convert(src);
        }
        self.scratch = scratch;
    }
}
