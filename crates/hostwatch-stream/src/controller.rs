//! The stream controller.
//!
//! Sole consumer of an [`EventSource`] and sole owner of the event history,
//! the active alert slot and the connection status. All mutation happens
//! under one lock, from three places: the pump task draining the feed, the
//! expiry timers, and the public `start`/`stop`/`dismiss_alert` calls.
//!
//! Every attachment gets an epoch number. Signals carry the epoch of the
//! attachment that produced them and are dropped once that attachment has
//! been replaced or stopped, so `stop` takes effect immediately even if a
//! signal was already in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use hostwatch_core::{ConnectionState, ConnectionStatus, Event, Level, Source, StreamConfig};
use hostwatch_feed::{EventSource, FeedHandle, FeedSignal, FeedSink};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alert::{AlertSlot, AlertStats, ClearReason, ExpiryTimer};
use crate::history::EventHistory;

/// Change notification published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// An event entered the history
    EventAppended(Event),
    /// A critical event took the alert slot
    AlertRaised(Event),
    /// The alert slot was emptied or its occupant replaced
    AlertCleared { event: Event, reason: ClearReason },
    /// The connection status changed
    StatusChanged(ConnectionStatus),
}

struct Attachment {
    handle: FeedHandle,
    pump: JoinHandle<()>,
}

impl Attachment {
    fn is_finished(&self) -> bool {
        self.pump.is_finished() || self.handle.is_finished()
    }

    fn detach(self) {
        self.pump.abort();
        self.handle.detach();
    }
}

struct State {
    source: Box<dyn EventSource>,
    attachment: Option<Attachment>,
    epoch: u64,
    history: EventHistory,
    alert: AlertSlot,
    generation: u64,
    status: ConnectionStatus,
    stats: AlertStats,
}

struct Shared {
    state: Mutex<State>,
    updates: broadcast::Sender<StreamUpdate>,
    alert_timeout: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, update: StreamUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    fn set_status(&self, state: &mut State, status: ConnectionState) {
        if state.status.status == status {
            return;
        }
        state.status = ConnectionStatus::new(status);
        info!(status = %status, "connection status changed");
        self.publish(StreamUpdate::StatusChanged(state.status));
    }

    /// Apply one feed signal; false once `epoch` is no longer current.
    fn apply(self: &Arc<Self>, epoch: u64, signal: FeedSignal) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            return false;
        }
        match signal {
            FeedSignal::Event(event) => self.on_event(&mut state, event),
            FeedSignal::Status(status) => self.set_status(&mut state, status),
        }
        true
    }

    fn on_event(self: &Arc<Self>, state: &mut State, event: Event) {
        if !state.history.push(event.clone()) {
            debug!(id = %event.id(), "duplicate event ignored");
            return;
        }
        debug!(id = %event.id(), level = %event.level(), "event appended");
        self.publish(StreamUpdate::EventAppended(event.clone()));

        if event.is_critical() {
            self.raise(state, event);
        }
    }

    fn raise(self: &Arc<Self>, state: &mut State, event: Event) {
        state.generation += 1;
        let generation = state.generation;
        let timer = ExpiryTimer::new(generation, self.spawn_expiry(generation));

        if let Some(previous) = state.alert.arm(event.clone(), timer) {
            state.stats.record_clear(ClearReason::Superseded);
            debug!(id = %previous.id(), "alert superseded");
            self.publish(StreamUpdate::AlertCleared {
                event: previous,
                reason: ClearReason::Superseded,
            });
        }
        state.stats.raised += 1;
        info!(
            id = %event.id(),
            source = %event.source(),
            host = event.hostname().unwrap_or("-"),
            "alert raised"
        );
        self.publish(StreamUpdate::AlertRaised(event));
    }

    fn spawn_expiry(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let shared = Arc::downgrade(self);
        let timeout = self.alert_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire(generation);
            }
        })
    }

    fn expire(&self, generation: u64) {
        let mut state = self.lock();
        if let Some(event) = state.alert.expire(generation) {
            state.stats.record_clear(ClearReason::Expired);
            info!(id = %event.id(), "alert expired");
            self.publish(StreamUpdate::AlertCleared {
                event,
                reason: ClearReason::Expired,
            });
        }
    }

    fn clear(&self, state: &mut State, reason: ClearReason) {
        if let Some(event) = state.alert.clear() {
            state.stats.record_clear(reason);
            info!(id = %event.id(), reason = %reason, "alert cleared");
            self.publish(StreamUpdate::AlertCleared { event, reason });
        }
    }
}

async fn pump(shared: Weak<Shared>, epoch: u64, mut rx: mpsc::UnboundedReceiver<FeedSignal>) {
    while let Some(signal) = rx.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.apply(epoch, signal) {
            break;
        }
    }
}

/// Owner of history, active alert and connection status for one feed.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct StreamController {
    shared: Arc<Shared>,
}

impl StreamController {
    /// Create a controller over `source`. Nothing is attached until
    /// [`start`](Self::start).
    pub fn new(source: impl EventSource + 'static, config: &StreamConfig) -> Self {
        let (updates, _) = broadcast::channel(config.update_buffer.max(1));
        let state = State {
            source: Box::new(source),
            attachment: None,
            epoch: 0,
            history: EventHistory::new(config.history_capacity),
            alert: AlertSlot::Empty,
            generation: 0,
            status: ConnectionStatus::default(),
            stats: AlertStats::default(),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                updates,
                alert_timeout: config.alert_timeout(),
            }),
        }
    }

    /// Attach to the feed.
    ///
    /// No-op while a live attachment exists. After the feed reported an
    /// error, or ended on its own, the stale attachment is dropped and a
    /// fresh one made. Must be called within a tokio runtime.
    pub fn start(&self) {
        let shared = &self.shared;
        let mut state = shared.lock();

        let live = state.attachment.as_ref().is_some_and(|a| !a.is_finished());
        if live && state.status.status != ConnectionState::Error {
            debug!("start ignored, already attached");
            return;
        }
        if let Some(stale) = state.attachment.take() {
            warn!(feed = %stale.handle.label(), "replacing failed feed attachment");
            stale.detach();
        }

        state.epoch += 1;
        let epoch = state.epoch;
        let (sink, mut rx) = FeedSink::channel();
        let handle = state.source.attach(sink);
        info!(feed = %handle.label(), "stream started");

        // Whatever the source produced synchronously (typically its
        // `connected` status) is visible as soon as start returns.
        while let Ok(signal) = rx.try_recv() {
            match signal {
                FeedSignal::Event(event) => shared.on_event(&mut state, event),
                FeedSignal::Status(status) => shared.set_status(&mut state, status),
            }
        }

        let pump = tokio::spawn(pump(Arc::downgrade(shared), epoch, rx));
        state.attachment = Some(Attachment { handle, pump });
    }

    /// Detach from the feed.
    ///
    /// Status becomes `disconnected` and the expiry timer is cancelled;
    /// history and the active alert are kept.
    pub fn stop(&self) {
        let shared = &self.shared;
        let mut state = shared.lock();
        state.epoch += 1;
        if let Some(attachment) = state.attachment.take() {
            info!(feed = %attachment.handle.label(), "stream stopped");
            attachment.detach();
        }
        state.alert.disarm_timer();
        shared.set_status(&mut state, ConnectionState::Disconnected);
    }

    /// Clear the active alert now. No-op when the slot is empty.
    pub fn dismiss_alert(&self) {
        let mut state = self.shared.lock();
        self.shared.clear(&mut state, ClearReason::Dismissed);
    }

    /// Process one event as if the feed had delivered it.
    pub(crate) fn on_event(&self, event: Event) {
        let mut state = self.shared.lock();
        self.shared.on_event(&mut state, event);
    }

    /// History snapshot, newest first.
    pub fn history(&self) -> Vec<Event> {
        self.shared.lock().history.to_vec()
    }

    /// History entries at or above `min`, newest first.
    pub fn history_at_least(&self, min: Level) -> Vec<Event> {
        let state = self.shared.lock();
        state.history.filter_level(min).into_iter().cloned().collect()
    }

    /// History entries from `source`, newest first.
    pub fn history_from(&self, source: &Source) -> Vec<Event> {
        let state = self.shared.lock();
        state.history.filter_source(source).into_iter().cloned().collect()
    }

    pub fn active_alert(&self) -> Option<Event> {
        self.shared.lock().alert.event().cloned()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.lock().status
    }

    pub fn alert_stats(&self) -> AlertStats {
        self.shared.lock().stats
    }

    /// Events evicted from history so far.
    pub fn dropped_count(&self) -> usize {
        self.shared.lock().history.dropped_count()
    }

    /// Label of the configured source.
    pub fn source_label(&self) -> String {
        self.shared.lock().source.label()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamUpdate> {
        self.shared.updates.subscribe()
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("StreamController")
            .field("source", &state.source.label())
            .field("status", &state.status.status)
            .field("history", &state.history.len())
            .field("alert", &state.alert.event().map(|e| e.id().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostwatch_core::{HostState, Source};

    /// Source that only reports `connected` and otherwise stays silent.
    struct QuietFeed;

    impl EventSource for QuietFeed {
        fn label(&self) -> String {
            "quiet".to_string()
        }

        fn attach(&mut self, sink: FeedSink) -> FeedHandle {
            sink.status(ConnectionState::Connected);
            let mut handle = FeedHandle::new(self.label(), sink);
            handle.track(tokio::spawn(std::future::pending::<()>()));
            handle
        }
    }

    fn controller() -> StreamController {
        StreamController::new(QuietFeed, &StreamConfig::default())
    }

    fn critical(name: &str) -> Event {
        Event::new(Level::Critical, name)
            .with_source(Source::Nagios)
            .with_hostname(name)
            .with_status(HostState::Down)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_connects_and_is_idempotent() {
        let ctl = controller();
        assert_eq!(ctl.status().status, ConnectionState::Disconnected);

        ctl.start();
        assert_eq!(ctl.status().status, ConnectionState::Connected);
        let first_update = ctl.status().last_update;

        ctl.start();
        assert_eq!(ctl.status().status, ConnectionState::Connected);
        assert_eq!(ctl.status().last_update, first_update);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_critical_never_touches_slot() {
        let ctl = controller();
        ctl.on_event(critical("a"));
        for level in [Level::Info, Level::Warning, Level::Error] {
            ctl.on_event(Event::new(level, "noise"));
            assert_eq!(ctl.active_alert().unwrap().message(), "a");
        }

        ctl.dismiss_alert();
        ctl.on_event(Event::new(Level::Error, "noise"));
        assert!(ctl.active_alert().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_exact_timeout() {
        let ctl = controller();
        ctl.on_event(critical("a"));

        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert!(ctl.active_alert().is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(ctl.active_alert().is_none());
        assert_eq!(ctl.alert_stats().expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_never_clears_newer_alert() {
        let ctl = controller();
        ctl.on_event(critical("a"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        ctl.on_event(critical("b"));

        // A's deadline (t=10) passes; B is due at t=16.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ctl.active_alert().unwrap().message(), "b");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(ctl.active_alert().is_none());

        let stats = ctl.alert_stats();
        assert_eq!(stats.raised, 2);
        assert_eq!(stats.superseded, 1);
        assert_eq!(stats.expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_idempotent() {
        let ctl = controller();
        ctl.dismiss_alert();
        assert!(ctl.active_alert().is_none());

        ctl.on_event(critical("a"));
        ctl.dismiss_alert();
        ctl.dismiss_alert();
        assert!(ctl.active_alert().is_none());
        assert_eq!(ctl.alert_stats().dismissed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_alert_and_cancels_expiry() {
        let ctl = controller();
        ctl.start();
        ctl.on_event(critical("a"));
        ctl.on_event(Event::new(Level::Info, "b"));

        ctl.stop();
        assert_eq!(ctl.status().status, ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ctl.active_alert().unwrap().message(), "a");
        assert_eq!(ctl.history().len(), 2);
        assert_eq!(ctl.alert_stats().expired, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_event_ignored() {
        let ctl = controller();
        let event = critical("a");
        ctl.on_event(event.clone());
        ctl.dismiss_alert();
        ctl.on_event(event);
        assert_eq!(ctl.history().len(), 1);
        assert!(ctl.active_alert().is_none());
        assert_eq!(ctl.alert_stats().raised, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_order_on_supersede() {
        let ctl = controller();
        let mut updates = ctl.subscribe();
        let a = critical("a");
        let b = critical("b");
        ctl.on_event(a.clone());
        ctl.on_event(b.clone());

        let seen: Vec<_> = std::iter::from_fn(|| updates.try_recv().ok()).collect();
        assert_eq!(
            seen,
            vec![
                StreamUpdate::EventAppended(a.clone()),
                StreamUpdate::AlertRaised(a.clone()),
                StreamUpdate::EventAppended(b.clone()),
                StreamUpdate::AlertCleared {
                    event: a,
                    reason: ClearReason::Superseded
                },
                StreamUpdate::AlertRaised(b),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_filters() {
        let ctl = controller();
        ctl.on_event(Event::new(Level::Info, "i"));
        ctl.on_event(Event::new(Level::Warning, "w"));
        ctl.on_event(critical("c"));

        let at_least_warning: Vec<_> = ctl
            .history_at_least(Level::Warning)
            .iter()
            .map(|e| e.message().to_string())
            .collect();
        assert_eq!(at_least_warning, vec!["c", "w"]);
        assert_eq!(ctl.history_from(&Source::Nagios).len(), 1);
    }
}
