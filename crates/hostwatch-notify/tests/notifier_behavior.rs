//! Notifier behavior against a recording engine.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ::async_trait::async_trait;
use hostwatch_core::{ConnectionState, Event, HostState, Level, Source, StreamConfig};
use hostwatch_feed::{EventSource, FeedHandle, FeedSink};
use hostwatch_notify::tone::fallback_tone;
use hostwatch_notify::wav::encode_wav_pcm16;
use hostwatch_notify::{
    AssetLoader, AudioBackend, AudioEngine, AudioError, AudioResult, DefaultAssetLoader,
    EngineState, Notifier, NotifierSettings, SoundBuffer, SoundOrigin, Urgency, Voice,
    spawn_alert_listener,
};
use hostwatch_stream::StreamController;
use tokio::time::Instant;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

const RATE: u32 = 8_000;

struct Play {
    at: Instant,
    voice: Voice,
}

#[derive(Default)]
struct RecordingEngine {
    plays: Mutex<Vec<Play>>,
    suspended: AtomicBool,
    resume_fails: AtomicBool,
    resumes: AtomicUsize,
}

impl RecordingEngine {
    fn plays(&self) -> usize {
        self.plays.lock().unwrap().len()
    }
}

impl AudioEngine for RecordingEngine {
    fn state(&self) -> EngineState {
        if self.suspended.load(Ordering::SeqCst) {
            EngineState::Suspended
        } else {
            EngineState::Running
        }
    }

    fn resume(&self) -> AudioResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.resume_fails.load(Ordering::SeqCst) {
            return Err(AudioError::Suspended("still backgrounded".into()));
        }
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        RATE
    }

    fn play(&self, voice: Voice) -> AudioResult<()> {
        self.plays.lock().unwrap().push(Play {
            at: Instant::now(),
            voice,
        });
        Ok(())
    }
}

#[derive(Default)]
struct RecordingBackend {
    engine: Arc<RecordingEngine>,
    opens: AtomicUsize,
    fail_open: AtomicBool,
}

impl AudioBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn open(&self) -> AudioResult<Arc<dyn AudioEngine>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::Unavailable("no device".into()));
        }
        let engine: Arc<dyn AudioEngine> = self.engine.clone();
        Ok(engine)
    }
}

struct FailingLoader;

#[async_trait]
impl AssetLoader for FailingLoader {
    async fn fetch(&self, location: &str) -> AudioResult<Vec<u8>> {
        Err(AudioError::fetch(location, "404 Not Found"))
    }
}

struct StaticLoader(Vec<u8>);

#[async_trait]
impl AssetLoader for StaticLoader {
    async fn fetch(&self, _location: &str) -> AudioResult<Vec<u8>> {
        Ok(self.0.clone())
    }
}

fn notifier(backend: &Arc<RecordingBackend>, loader: impl AssetLoader + 'static) -> Notifier {
    Notifier::new(backend.clone(), Arc::new(loader), NotifierSettings::default())
}

fn short_wav() -> Vec<u8> {
    encode_wav_pcm16(&SoundBuffer::new(vec![0.25; 400], RATE))
}

/// Ten silent MPEG-1 Layer III frames: 128 kbit/s, 44.1 kHz, mono.
fn silent_mp3() -> Vec<u8> {
    let mut frame = vec![0u8; 417];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
    frame.repeat(10)
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_falls_back_to_tone() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, FailingLoader);

    assert!(notifier.ensure_ready().await);
    let resources = notifier.resources().unwrap();
    assert_eq!(resources.origin(), SoundOrigin::Fallback);
    assert_eq!(resources.buffer().samples(), fallback_tone(RATE).samples());

    notifier.notify(Urgency::Normal);
    assert_eq!(backend.engine.plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_asset_falls_back_to_tone() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, StaticLoader(b"ID3\x04not really audio".to_vec()));

    assert!(notifier.ensure_ready().await);
    assert_eq!(notifier.resources().unwrap().origin(), SoundOrigin::Fallback);
}

#[tokio::test(start_paused = true)]
async fn test_notify_before_ready_is_noop() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, FailingLoader);

    notifier.notify(Urgency::High);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.engine.plays(), 0);
    assert_eq!(backend.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_ready_is_idempotent() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, StaticLoader(short_wav()));

    assert!(notifier.ensure_ready().await);
    assert!(notifier.ensure_ready().await);
    assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
    assert_eq!(notifier.resources().unwrap().origin(), SoundOrigin::Asset);
}

#[tokio::test(start_paused = true)]
async fn test_open_failure_is_retried() {
    let backend = Arc::new(RecordingBackend::default());
    backend.fail_open.store(true, Ordering::SeqCst);
    let notifier = notifier(&backend, StaticLoader(short_wav()));

    assert!(!notifier.ensure_ready().await);
    assert!(!notifier.is_ready());

    backend.fail_open.store(false, Ordering::SeqCst);
    assert!(notifier.ensure_ready().await);
    assert_eq!(backend.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_high_urgency_repeats_with_shared_buffer_and_gain() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, StaticLoader(short_wav()));
    notifier.ensure_ready().await;

    let start = Instant::now();
    notifier.notify(Urgency::High);
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let plays = backend.engine.plays.lock().unwrap();
    assert_eq!(plays.len(), 3);
    let offsets: Vec<_> = plays.iter().map(|p| p.at - start).collect();
    assert_eq!(
        offsets,
        vec![Duration::ZERO, Duration::from_millis(500), Duration::from_millis(1_000)]
    );

    let first = &plays[0].voice;
    for play in plays.iter() {
        assert_eq!(play.voice.params().gain, 1.0);
        assert_eq!(play.voice.params().attack, Duration::from_millis(150));
        assert!(play.voice.buffer().shares_data(first.buffer()));
        assert!(play.voice.master().is_shared_with(first.master()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_normal_urgency_plays_once_quieter() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, StaticLoader(short_wav()));
    notifier.ensure_ready().await;

    notifier.notify(Urgency::Normal);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let plays = backend.engine.plays.lock().unwrap();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].voice.params().gain, 0.7);
}

#[tokio::test(start_paused = true)]
async fn test_suspended_engine_resumed_before_play() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, StaticLoader(short_wav()));
    notifier.ensure_ready().await;

    backend.engine.suspended.store(true, Ordering::SeqCst);
    notifier.notify(Urgency::Normal);
    assert_eq!(backend.engine.resumes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.engine.plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_resume_skips_play_without_error() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = notifier(&backend, StaticLoader(short_wav()));
    notifier.ensure_ready().await;

    backend.engine.suspended.store(true, Ordering::SeqCst);
    backend.engine.resume_fails.store(true, Ordering::SeqCst);
    notifier.notify(Urgency::Normal);
    assert_eq!(backend.engine.plays(), 0);

    backend.engine.resume_fails.store(false, Ordering::SeqCst);
    notifier.notify(Urgency::Normal);
    assert_eq!(backend.engine.plays(), 1);
}

#[tokio::test]
async fn test_http_asset_is_fetched_and_decoded() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/alert.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(short_wav()))
        .mount(&server)
        .await;

    let backend = Arc::new(RecordingBackend::default());
    let settings = NotifierSettings {
        asset: format!("{}/alert.wav", server.uri()),
        ..NotifierSettings::default()
    };
    let notifier = Notifier::new(
        backend.clone(),
        Arc::new(DefaultAssetLoader::new().unwrap()),
        settings,
    );

    assert!(notifier.ensure_ready().await);
    let resources = notifier.resources().unwrap();
    assert_eq!(resources.origin(), SoundOrigin::Asset);
    assert_eq!(resources.buffer().len(), 400);
}

#[tokio::test]
async fn test_http_mp3_asset_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/alert.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(silent_mp3()))
        .mount(&server)
        .await;

    let backend = Arc::new(RecordingBackend::default());
    let settings = NotifierSettings {
        asset: format!("{}/alert.mp3", server.uri()),
        ..NotifierSettings::default()
    };
    let notifier = Notifier::new(
        backend.clone(),
        Arc::new(DefaultAssetLoader::new().unwrap()),
        settings,
    );

    assert!(notifier.ensure_ready().await);
    let resources = notifier.resources().unwrap();
    assert_eq!(resources.origin(), SoundOrigin::Asset);
    assert_eq!(resources.buffer().sample_rate(), 44_100);
    notifier.notify(Urgency::Normal);
    assert_eq!(backend.engine.plays(), 1);
}

#[tokio::test]
async fn test_http_404_falls_back() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = Arc::new(RecordingBackend::default());
    let settings = NotifierSettings {
        asset: format!("{}/alert.mp3", server.uri()),
        ..NotifierSettings::default()
    };
    let notifier = Notifier::new(
        backend.clone(),
        Arc::new(DefaultAssetLoader::new().unwrap()),
        settings,
    );

    assert!(notifier.ensure_ready().await);
    assert_eq!(notifier.resources().unwrap().origin(), SoundOrigin::Fallback);
    notifier.notify(Urgency::Normal);
    assert_eq!(backend.engine.plays(), 1);
}

/// Delivers a fixed batch of events as soon as it is attached.
struct BatchFeed(Vec<Event>);

impl EventSource for BatchFeed {
    fn label(&self) -> String {
        "batch".to_string()
    }

    fn attach(&mut self, sink: FeedSink) -> FeedHandle {
        sink.status(ConnectionState::Connected);
        for event in self.0.drain(..) {
            sink.event(event);
        }
        let mut handle = FeedHandle::new(self.label(), sink);
        handle.track(tokio::spawn(std::future::pending::<()>()));
        handle
    }
}

#[tokio::test(start_paused = true)]
async fn test_info_warning_critical_notifies_once_with_high_urgency() {
    let backend = Arc::new(RecordingBackend::default());
    let notifier = Arc::new(notifier(&backend, StaticLoader(short_wav())));
    notifier.ensure_ready().await;

    let feed = BatchFeed(vec![
        Event::new(Level::Info, "info"),
        Event::new(Level::Warning, "warning"),
        Event::new(Level::Critical, "HOST NOTIFICATION: hostA is DOWN")
            .with_source(Source::Nagios)
            .with_hostname("hostA")
            .with_status(HostState::Down),
    ]);
    let controller = StreamController::new(feed, &StreamConfig::default());
    let listener = spawn_alert_listener(controller.subscribe(), notifier.clone(), None);
    controller.start();

    assert_eq!(controller.history().len(), 3);
    assert_eq!(controller.active_alert().unwrap().level(), Level::Critical);

    // One high-urgency notification: the play plus its two repeats.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    {
        let plays = backend.engine.plays.lock().unwrap();
        assert_eq!(plays.len(), 3);
        assert!(plays.iter().all(|p| p.voice.params().gain == Urgency::High.gain()));
    }

    drop(controller);
    listener.await.unwrap();
}
