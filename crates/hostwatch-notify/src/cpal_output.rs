//! Output through the default sound device via cpal.
//!
//! Linux build note: cpal needs the ALSA development headers
//! (`libasound2-dev` and `pkg-config` on Debian/Ubuntu).
//!
//! The cpal stream is not `Send`, so it lives on a dedicated thread for the
//! life of the engine. The output callback pulls from a shared [`Mixer`];
//! `play` only pushes a voice into it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use tracing::{error, info, warn};

use crate::audio::{AudioBackend, AudioEngine, EngineState, Voice};
use crate::error::{AudioError, AudioResult};
use crate::mixer::Mixer;

const STATE_RUNNING: u8 = 0;
const STATE_SUSPENDED: u8 = 1;
const STATE_CLOSED: u8 = 2;

enum Command {
    Resume(SyncSender<AudioResult<()>>),
    Close,
}

/// Backend opening the default (or a named) output device.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Case-insensitive substring of the device name to prefer
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self) -> AudioResult<Arc<dyn AudioEngine>> {
        let engine = CpalEngine::open(self.device_name.clone())?;
        Ok(Arc::new(engine))
    }
}

/// Engine backed by a cpal output stream.
pub struct CpalEngine {
    mixer: Arc<Mutex<Mixer>>,
    state: Arc<AtomicU8>,
    sample_rate: u32,
    commands: Sender<Command>,
}

impl CpalEngine {
    fn open(device_name: Option<String>) -> AudioResult<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<AudioResult<(u32, u16)>>(1);
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let mixer = Arc::new(Mutex::new(Mixer::new(2, 48_000)));
        let state = Arc::new(AtomicU8::new(STATE_RUNNING));

        let thread_mixer = Arc::clone(&mixer);
        let thread_state = Arc::clone(&state);
        std::thread::Builder::new()
            .name("hostwatch-audio".into())
            .spawn(move || run_output(device_name, thread_mixer, thread_state, ready_tx, cmd_rx))
            .map_err(|e| AudioError::Unavailable(format!("failed to spawn audio thread: {e}")))?;

        let (sample_rate, _channels) = ready_rx
            .recv()
            .map_err(|_| AudioError::Unavailable("audio thread exited during setup".into()))??;

        Ok(Self {
            mixer,
            state,
            sample_rate,
            commands: cmd_tx,
        })
    }
}

impl AudioEngine for CpalEngine {
    fn state(&self) -> EngineState {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => EngineState::Running,
            STATE_SUSPENDED => EngineState::Suspended,
            _ => EngineState::Closed,
        }
    }

    fn resume(&self) -> AudioResult<()> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.commands
            .send(Command::Resume(reply_tx))
            .map_err(|_| AudioError::Suspended("audio thread gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| AudioError::Suspended("audio thread gone".into()))?
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&self, voice: Voice) -> AudioResult<()> {
        if self.state() == EngineState::Closed {
            return Err(AudioError::Playback("engine closed".into()));
        }
        self.mixer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(voice);
        Ok(())
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

fn select_device(host: &cpal::Host, needle: Option<&str>) -> Option<cpal::Device> {
    if let Some(needle) = needle {
        let needle = needle.to_lowercase();
        match host.output_devices() {
            Ok(devices) => {
                for device in devices {
                    if let Ok(name) = device.name() {
                        if name.to_lowercase().contains(&needle) {
                            info!(device = %name, "selected output device by name");
                            return Some(device);
                        }
                    }
                }
                warn!(needle = %needle, "no output device matched, using default");
            }
            Err(e) => warn!(error = %e, "failed to list output devices"),
        }
    }
    host.default_output_device()
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
    state: Arc<AtomicU8>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            mixer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .render_with(data, T::from_sample);
        },
        move |err| {
            error!(error = %err, "audio output stream error");
            state.store(STATE_SUSPENDED, Ordering::Release);
        },
        None,
    )
}

fn open_stream(
    device_name: Option<&str>,
    mixer: &Arc<Mutex<Mixer>>,
    state: &Arc<AtomicU8>,
) -> AudioResult<(cpal::Stream, u32, u16)> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name)
        .ok_or_else(|| AudioError::Unavailable("no output device available".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Unavailable(format!("no output config: {e}")))?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    *mixer.lock().unwrap_or_else(PoisonError::into_inner) = Mixer::new(channels, sample_rate);

    let config: cpal::StreamConfig = supported.config();
    let (m, s) = (Arc::clone(mixer), Arc::clone(state));
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config, m, s),
        cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config, m, s),
        cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config, m, s),
        cpal::SampleFormat::U8 => build_output_stream::<u8>(&device, &config, m, s),
        other => {
            return Err(AudioError::Unavailable(format!(
                "unsupported output sample format {other:?}"
            )));
        }
    }
    .map_err(|e| AudioError::Unavailable(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AudioError::Unavailable(format!("failed to start output stream: {e}")))?;

    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".into()),
        sample_rate,
        channels,
        "audio output opened"
    );
    Ok((stream, sample_rate, channels))
}

fn run_output(
    device_name: Option<String>,
    mixer: Arc<Mutex<Mixer>>,
    state: Arc<AtomicU8>,
    ready: SyncSender<AudioResult<(u32, u16)>>,
    commands: Receiver<Command>,
) {
    let stream = match open_stream(device_name.as_deref(), &mixer, &state) {
        Ok((stream, sample_rate, channels)) => {
            let _ = ready.send(Ok((sample_rate, channels)));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            Command::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::Suspended(e.to_string()));
                if result.is_ok() {
                    state.store(STATE_RUNNING, Ordering::Release);
                }
                let _ = reply.send(result);
            }
            Command::Close => break,
        }
    }
    state.store(STATE_CLOSED, Ordering::Release);
}
