//! Sound asset decoding.
//!
//! RIFF/WAVE goes through the local decoder in [`crate::wav`]. Everything
//! else (MP3, FLAC, Ogg Vorbis) has its format detected and is decoded with
//! symphonia, then down-mixed to mono. The asset's file extension, when
//! known, is passed as a format hint.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::audio::SoundBuffer;
use crate::error::{AudioError, AudioResult};
use crate::wav::decode_wav;

/// Decode an asset of any supported format into a mono buffer.
pub fn decode_sound(bytes: &[u8], extension: Option<&str>) -> AudioResult<SoundBuffer> {
    if bytes.starts_with(b"RIFF") {
        return decode_wav(bytes);
    }
    decode_compressed(bytes, extension)
}

/// Extension of the last path segment of `location`, ignoring any query.
pub fn asset_extension(location: &str) -> Option<&str> {
    let path = location.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

fn decode_compressed(bytes: &[u8], extension: Option<&str>) -> AudioResult<SoundBuffer> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::decode(format!("unrecognized audio format: {e}")))?;
    let mut reader = detected.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::decode("no decodable audio track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::decode(format!("unsupported codec: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::decode(format!("reading packet: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet loses its frames, not the whole asset.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = e, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(AudioError::decode(format!("decoding packet: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let channels = spec.channels.count().max(1);
        let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        samples.extend(
            interleaved
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if samples.is_empty() {
        return Err(AudioError::decode("asset contains no audio frames"));
    }
    let sample_rate = sample_rate.ok_or_else(|| AudioError::decode("unknown sample rate"))?;
    Ok(SoundBuffer::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::encode_wav_pcm16;

    /// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, mono, no padding: 417 bytes
    /// per frame. Zeroed side info means no main data, so each frame
    /// decodes to 1152 samples of silence.
    fn silent_mp3(frames: usize) -> Vec<u8> {
        const FRAME_LEN: usize = 144 * 128_000 / 44_100;
        let mut frame = vec![0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
        frame.repeat(frames)
    }

    #[test]
    fn test_decodes_mp3() {
        let buffer = decode_sound(&silent_mp3(20), Some("mp3")).unwrap();
        assert_eq!(buffer.sample_rate(), 44_100);
        assert!(buffer.len() >= 1152, "decoded {} samples", buffer.len());
        assert!(buffer.samples().iter().all(|s| s.abs() < 1e-4));
    }

    #[test]
    fn test_decodes_mp3_without_hint() {
        let buffer = decode_sound(&silent_mp3(20), None).unwrap();
        assert_eq!(buffer.sample_rate(), 44_100);
    }

    #[test]
    fn test_wav_takes_local_path() {
        let source = SoundBuffer::new(vec![0.0, 0.25, -0.25, 0.5], 8_000);
        let decoded = decode_sound(&encode_wav_pcm16(&source), Some("mp3")).unwrap();
        assert_eq!(decoded.sample_rate(), 8_000);
        assert_eq!(decoded.len(), 4);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = decode_sound(b"definitely not audio", Some("mp3")).unwrap_err();
        assert!(err.wants_fallback());
    }

    #[test]
    fn test_asset_extension() {
        assert_eq!(asset_extension("/alert.mp3"), Some("mp3"));
        assert_eq!(asset_extension("https://noc.example/sounds/siren.ogg?v=3"), Some("ogg"));
        assert_eq!(asset_extension("https://noc.example.com/alert"), None);
        assert_eq!(asset_extension("alert."), None);
    }
}
