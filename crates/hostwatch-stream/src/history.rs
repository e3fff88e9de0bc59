//! Bounded event history.
//!
//! Newest first. When the buffer is full, appending evicts the oldest entry.
//! Event ids are unique within the buffer: a second event carrying an id
//! already held is rejected.

use std::collections::{HashSet, VecDeque};

use hostwatch_core::{Event, EventId, Level, Source};

/// Default history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Ring buffer of events, newest first.
#[derive(Debug, Clone)]
pub struct EventHistory {
    entries: VecDeque<Event>,
    ids: HashSet<EventId>,
    capacity: usize,
    /// Total events ever accepted
    total_added: usize,
    /// Events evicted by the capacity limit
    dropped_count: usize,
}

impl EventHistory {
    /// Create a history holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(10_000)),
            ids: HashSet::with_capacity(capacity.min(10_000)),
            capacity,
            total_added: 0,
            dropped_count: 0,
        }
    }

    /// Append an event as the newest entry.
    ///
    /// Returns false, leaving the history unchanged, when an event with the
    /// same id is already held.
    pub fn push(&mut self, event: Event) -> bool {
        if self.ids.contains(event.id()) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                self.ids.remove(evicted.id());
            }
            self.dropped_count += 1;
        }
        self.ids.insert(event.id().clone());
        self.entries.push_front(event);
        self.total_added += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_added(&self) -> usize {
        self.total_added
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped_count
    }

    /// Whether an event with `id` is currently held.
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Iterate newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&Event> {
        self.entries.front()
    }

    pub fn oldest(&self) -> Option<&Event> {
        self.entries.back()
    }

    /// Events at or above `min`, newest first.
    pub fn filter_level(&self, min: Level) -> Vec<&Event> {
        self.entries.iter().filter(|e| e.level() >= min).collect()
    }

    /// Events attributed to `source`, newest first.
    pub fn filter_source(&self, source: &Source) -> Vec<&Event> {
        self.entries.iter().filter(|e| e.source() == source).collect()
    }

    /// Owned snapshot, newest first.
    pub fn to_vec(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Event {
        Event::new(Level::Info, format!("event {n}")).with_id(format!("log-{n}"))
    }

    #[test]
    fn test_newest_first() {
        let mut history = EventHistory::new(10);
        for n in 1..=3 {
            assert!(history.push(numbered(n)));
        }
        let messages: Vec<_> = history.iter().map(Event::message).collect();
        assert_eq!(messages, vec!["event 3", "event 2", "event 1"]);
        assert_eq!(history.newest().unwrap().message(), "event 3");
        assert_eq!(history.oldest().unwrap().message(), "event 1");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = EventHistory::new(100);
        for n in 1..=105 {
            history.push(numbered(n));
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.total_added(), 105);
        assert_eq!(history.dropped_count(), 5);
        assert_eq!(history.newest().unwrap().message(), "event 105");
        assert_eq!(history.oldest().unwrap().message(), "event 6");
        assert!(!history.contains(&EventId::from("log-5")));
        assert!(history.contains(&EventId::from("log-6")));
    }

    #[test]
    fn test_length_is_min_of_n_and_capacity() {
        for capacity in [1, 3, 7] {
            for n in 0..12 {
                let mut history = EventHistory::new(capacity);
                for i in 0..n {
                    history.push(numbered(i));
                }
                assert_eq!(history.len(), n.min(capacity));
            }
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut history = EventHistory::new(10);
        assert!(history.push(numbered(1)));
        assert!(!history.push(numbered(1)));
        assert_eq!(history.len(), 1);
        assert_eq!(history.total_added(), 1);
    }

    #[test]
    fn test_evicted_id_can_return() {
        let mut history = EventHistory::new(1);
        history.push(numbered(1));
        history.push(numbered(2));
        assert!(history.push(numbered(1)));
    }

    #[test]
    fn test_filters() {
        let mut history = EventHistory::new(10);
        history.push(Event::new(Level::Info, "a"));
        history.push(Event::new(Level::Error, "b"));
        history.push(Event::new(Level::Critical, "c").with_source(Source::Nagios));

        let severe: Vec<_> = history
            .filter_level(Level::Error)
            .into_iter()
            .map(Event::message)
            .collect();
        assert_eq!(severe, vec!["c", "b"]);

        let nagios = history.filter_source(&Source::Nagios);
        assert_eq!(nagios.len(), 1);
        assert_eq!(nagios[0].message(), "c");
        assert_eq!(history.filter_source(&Source::System).len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut history = EventHistory::new(0);
        history.push(numbered(1));
        assert_eq!(history.len(), 1);
    }
}
