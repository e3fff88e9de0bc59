//! RIFF/WAVE decoding.
//!
//! Supports PCM 8-bit (unsigned), 16-bit, 24-bit and 32-bit (signed) and
//! IEEE float 32-bit, any channel count, down-mixed to mono. Compressed
//! formats are left to [`crate::decode`].

use crate::audio::SoundBuffer;
use crate::error::{AudioError, AudioResult};

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy)]
struct Format {
    tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *bytes.get(at)?,
        *bytes.get(at + 1)?,
        *bytes.get(at + 2)?,
        *bytes.get(at + 3)?,
    ]))
}

fn parse_format(chunk: &[u8]) -> AudioResult<Format> {
    let field = |v: Option<u16>| v.ok_or_else(|| AudioError::decode("truncated fmt chunk"));
    let mut tag = field(read_u16(chunk, 0))?;
    let channels = field(read_u16(chunk, 2))?;
    let sample_rate = read_u32(chunk, 4).ok_or_else(|| AudioError::decode("truncated fmt chunk"))?;
    let bits_per_sample = field(read_u16(chunk, 14))?;

    if tag == FORMAT_EXTENSIBLE {
        // Sub-format GUID starts at offset 24; its first two bytes are the tag.
        tag = field(read_u16(chunk, 24))?;
    }
    Ok(Format {
        tag,
        channels,
        sample_rate,
        bits_per_sample,
    })
}

fn decode_sample(format: &Format, bytes: &[u8]) -> AudioResult<f32> {
    let sample = match (format.tag, format.bits_per_sample) {
        (FORMAT_PCM, 8) => (bytes[0] as f32 - 128.0) / 128.0,
        (FORMAT_PCM, 16) => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32_768.0,
        (FORMAT_PCM, 24) => {
            let v = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
            v as f32 / 8_388_608.0
        }
        (FORMAT_PCM, 32) => {
            i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / 2_147_483_648.0
        }
        (FORMAT_IEEE_FLOAT, 32) => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        (tag, bits) => {
            return Err(AudioError::decode(format!(
                "unsupported encoding (format {tag}, {bits} bits)"
            )));
        }
    };
    Ok(sample.clamp(-1.0, 1.0))
}

/// Decode a WAV file into a mono buffer.
pub fn decode_wav(bytes: &[u8]) -> AudioResult<SoundBuffer> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AudioError::decode("not a RIFF/WAVE file"));
    }

    let mut format = None;
    let mut data = None;
    let mut idx = 12;
    while idx + 8 <= bytes.len() {
        let id = &bytes[idx..idx + 4];
        let size = read_u32(bytes, idx + 4).unwrap_or(0) as usize;
        let start = idx + 8;
        // Tolerate a data chunk whose declared size runs past the end.
        let end = start.saturating_add(size).min(bytes.len());
        match id {
            b"fmt " => format = Some(parse_format(&bytes[start..end])?),
            b"data" => data = Some(&bytes[start..end]),
            _ => {}
        }
        // Chunks are word aligned.
        idx = start.saturating_add(size).saturating_add(size & 1);
    }

    let format = format.ok_or_else(|| AudioError::decode("missing fmt chunk"))?;
    let data = data.ok_or_else(|| AudioError::decode("missing data chunk"))?;
    if format.channels == 0 || format.sample_rate == 0 {
        return Err(AudioError::decode("zero channels or sample rate"));
    }

    let width = (format.bits_per_sample as usize).div_ceil(8);
    if width == 0 {
        return Err(AudioError::decode("zero sample width"));
    }
    let channels = format.channels as usize;
    let frame_bytes = width * channels;

    let mut samples = Vec::with_capacity(data.len() / frame_bytes);
    for frame in data.chunks_exact(frame_bytes) {
        let mut sum = 0.0;
        for raw in frame.chunks_exact(width) {
            sum += decode_sample(&format, raw)?;
        }
        samples.push(sum / channels as f32);
    }
    if samples.is_empty() {
        return Err(AudioError::decode("no audio frames"));
    }
    Ok(SoundBuffer::new(samples, format.sample_rate))
}

/// Encode a mono buffer as 16-bit PCM WAV.
pub fn encode_wav_pcm16(buffer: &SoundBuffer) -> Vec<u8> {
    let data_len = buffer.len() * 2;
    let mut out = Vec::with_capacity(44 + data_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate().to_le_bytes());
    out.extend_from_slice(&(buffer.sample_rate() * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());
    for &s in buffer.samples() {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
