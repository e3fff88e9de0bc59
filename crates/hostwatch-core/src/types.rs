//! Shared event and status types used across hostwatch crates.
//!
//! An [`Event`] is built once by a feed source and never mutated afterwards:
//! all fields are private and the `with_*` builders consume the value, so the
//! only way to "change" an event is to build a new one before it is shared.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Event severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Routine information
    #[default]
    Info,
    /// Degraded but working
    Warning,
    /// Something failed
    Error,
    /// Needs an operator now; the only level that can raise an alert
    Critical,
}

impl Level {
    /// Parse a level name, accepting the common aliases.
    ///
    /// Returns `None` for anything unrecognised so callers can decide how to
    /// degrade (the wire decoder falls back to [`Level::Info`]).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "information" | "notice" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warning),
            "error" | "err" => Some(Level::Error),
            "critical" | "crit" | "fatal" => Some(Level::Critical),
            _ => None,
        }
    }

    /// Whether events at this level may occupy the active alert slot.
    pub fn is_critical(&self) -> bool {
        matches!(self, Level::Critical)
    }

    /// Get the display symbol for this level.
    pub fn symbol(&self) -> &'static str {
        match self {
            Level::Info => "●",
            Level::Warning => "⚠",
            Level::Error => "✖",
            Level::Critical => "‼",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
            Level::Critical => write!(f, "critical"),
        }
    }
}

/// Origin tag of an event.
///
/// A missing source on the wire is normalized to [`Source::System`] at
/// ingestion, so consumers never have to treat absence specially.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    /// Generic system log
    #[default]
    System,
    /// Nagios host/service notification
    Nagios,
    /// Any other producer
    Other(String),
}

impl Source {
    /// Normalize an optional source tag.
    pub fn from_optional(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("") => Source::System,
            Some(tag) => Source::from(tag.to_string()),
        }
    }

    /// Get the wire name of this source.
    pub fn as_str(&self) -> &str {
        match self {
            Source::System => "system",
            Source::Nagios => "nagios",
            Source::Other(name) => name,
        }
    }
}

impl From<String> for Source {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "" | "system" => Source::System,
            "nagios" => Source::Nagios,
            _ => Source::Other(tag),
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the monitored resource when the event was produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HostState {
    /// Resource reachable
    Up,
    /// Resource down
    Down,
    /// Any other state name (UNREACHABLE, CRITICAL, ...)
    Other(String),
}

impl HostState {
    /// Get the wire name of this state.
    pub fn as_str(&self) -> &str {
        match self {
            HostState::Up => "UP",
            HostState::Down => "DOWN",
            HostState::Other(name) => name,
        }
    }
}

impl From<String> for HostState {
    fn from(state: String) -> Self {
        match state.to_ascii_uppercase().as_str() {
            "UP" => HostState::Up,
            "DOWN" => HostState::Down,
            _ => HostState::Other(state),
        }
    }
}

impl From<HostState> for String {
    fn from(state: HostState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, never-reused event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Generate a fresh identifier with a readable prefix (`log`, `alert`, ...).
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", uuid::Uuid::new_v4()))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One timestamped log or alert record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    timestamp: DateTime<Utc>,
    message: String,
    level: Level,
    #[serde(default)]
    source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<HostState>,
}

impl Event {
    /// Create a new event stamped now, with a generated `log-` id.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        let prefix = if level.is_critical() { "alert" } else { "log" };
        Self {
            id: EventId::generate(prefix),
            timestamp: Utc::now(),
            message: message.into(),
            level,
            source: Source::System,
            hostname: None,
            status: None,
        }
    }

    /// Replace the generated identifier.
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the production timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the origin tag.
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Set the resource this event concerns.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the resource state.
    pub fn with_status(mut self, status: HostState) -> Self {
        self.status = Some(status);
        self
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn status(&self) -> Option<&HostState> {
        self.status.as_ref()
    }

    /// Whether this event can occupy the active alert slot.
    pub fn is_critical(&self) -> bool {
        self.level.is_critical()
    }

    /// Format the event as a single console line.
    pub fn format_display(&self) -> String {
        let ts = self.timestamp.with_timezone(&Local).format("%H:%M:%S");
        let host = match self.hostname.as_deref() {
            Some(host) => format!(" <{host}>"),
            None => String::new(),
        };
        format!(
            "{} {} [{}]{} {}",
            ts,
            self.level.symbol(),
            self.source,
            host,
            self.message
        )
    }
}

/// Feed connection state shown by the status pill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Feed attached and delivering
    Connected,
    /// No feed attached
    #[default]
    Disconnected,
    /// Feed failed; stays here until the controller is restarted
    Error,
}

impl ConnectionState {
    /// Returns the indicator glyph for display.
    pub fn indicator(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "●",
            ConnectionState::Disconnected => "○",
            ConnectionState::Error => "✖",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Connection state plus the time of its last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub status: ConnectionState,
    pub last_update: DateTime<Utc>,
}

impl ConnectionStatus {
    /// Record a transition to `status` happening now.
    pub fn new(status: ConnectionState) -> Self {
        Self {
            status,
            last_update: Utc::now(),
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Critical > Level::Error);
        assert!(Level::Error > Level::Warning);
        assert!(Level::Warning > Level::Info);
    }

    #[test]
    fn test_level_parse_aliases() {
        assert_eq!(Level::parse("WARN"), Some(Level::Warning));
        assert_eq!(Level::parse(" critical "), Some(Level::Critical));
        assert_eq!(Level::parse("err"), Some(Level::Error));
        assert_eq!(Level::parse("panic"), None);
    }

    #[test]
    fn test_source_normalization() {
        assert_eq!(Source::from_optional(None), Source::System);
        assert_eq!(Source::from_optional(Some("")), Source::System);
        assert_eq!(Source::from_optional(Some("Nagios")), Source::Nagios);
        assert_eq!(
            Source::from_optional(Some("zabbix")),
            Source::Other("zabbix".to_string())
        );
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = Event::new(Level::Info, "a");
        let b = Event::new(Level::Info, "a");
        assert_ne!(a.id(), b.id());
        assert!(a.id().as_str().starts_with("log-"));
        assert!(Event::new(Level::Critical, "x").id().as_str().starts_with("alert-"));
    }

    #[test]
    fn test_event_serializes_wire_shape() {
        let event = Event::new(Level::Critical, "HOST NOTIFICATION: h1 is DOWN")
            .with_id("alert-1")
            .with_source(Source::Nagios)
            .with_hostname("h1")
            .with_status(HostState::Down);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["id"], "alert-1");
        assert_eq!(json["level"], "critical");
        assert_eq!(json["source"], "nagios");
        assert_eq!(json["hostname"], "h1");
        assert_eq!(json["status"], "DOWN");
    }

    #[test]
    fn test_event_missing_source_deserializes_as_system() {
        let json = r#"{"id":"x","timestamp":"2026-01-01T00:00:00Z","message":"m","level":"info"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.source(), &Source::System);
        assert!(event.hostname().is_none());
    }

    #[test]
    fn test_format_display_includes_host() {
        let event = Event::new(Level::Warning, "load high").with_hostname("server-3");
        let line = event.format_display();
        assert!(line.contains("⚠"));
        assert!(line.contains("<server-3>"));
        assert!(line.contains("[system]"));
    }

    #[test]
    fn test_connection_status_default() {
        let status = ConnectionStatus::default();
        assert_eq!(status.status, ConnectionState::Disconnected);
        assert_eq!(status.status.to_string(), "disconnected");
    }
}
