//! Wire schema for streamed feeds.
//!
//! Each frame is one JSON object tagged by `type`:
//!
//! ```text
//! {"type":"connection_status","status":"connected","timestamp":"..."}
//! {"type":"log_entry","data":{"id":"...","timestamp":"...","message":"...","level":"info"}}
//! {"type":"alert","data":{...,"level":"critical","source":"nagios","hostname":"h1","status":"DOWN"}}
//! ```
//!
//! Decoding is lenient about the event payload: unknown levels become
//! `info`, missing ids are generated, missing sources are `system`, and
//! unparseable timestamps take the arrival time.

use chrono::{DateTime, NaiveDateTime, Utc};
use hostwatch_core::{ConnectionState, Event, EventId, HostState, Level, Source};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{FeedError, FeedResult};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// `log_entry` or `alert`
    Event(Event),
    /// `connection_status`
    Status(ConnectionState),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Frame {
    ConnectionStatus { status: String },
    LogEntry { data: RawEvent },
    Alert { data: RawEvent },
}

/// Event payload as it appears on the wire, before normalization.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub message: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawEvent {
    /// Normalize into an [`Event`].
    pub fn into_event(self) -> Event {
        let level = match self.level.as_deref() {
            None => Level::Info,
            Some(name) => Level::parse(name).unwrap_or_else(|| {
                warn!(level = name, text = %self.message, "unknown event level, treating as info");
                Level::Info
            }),
        };

        let mut event = Event::new(level, self.message)
            .with_source(Source::from_optional(self.source.as_deref()))
            .with_timestamp(parse_timestamp(self.timestamp.as_deref()));
        if let Some(id) = self.id.filter(|id| !id.is_empty()) {
            event = event.with_id(EventId::from(id));
        }
        if let Some(hostname) = self.hostname.filter(|h| !h.is_empty()) {
            event = event.with_hostname(hostname);
        }
        if let Some(status) = self.status.filter(|s| !s.is_empty()) {
            event = event.with_status(HostState::from(status));
        }
        event
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO one (taken as UTC).
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc();
    }
    warn!(timestamp = raw, "unparseable event timestamp, using arrival time");
    Utc::now()
}

/// Decode one frame.
pub fn decode_message(line: &str) -> FeedResult<FeedMessage> {
    let frame: Frame = serde_json::from_str(line.trim())
        .map_err(|e| FeedError::decode(format!("invalid frame: {e}")))?;
    match frame {
        Frame::LogEntry { data } | Frame::Alert { data } => Ok(FeedMessage::Event(data.into_event())),
        Frame::ConnectionStatus { status } => match status.to_ascii_lowercase().as_str() {
            "connected" => Ok(FeedMessage::Status(ConnectionState::Connected)),
            "disconnected" => Ok(FeedMessage::Status(ConnectionState::Disconnected)),
            "error" => Ok(FeedMessage::Status(ConnectionState::Error)),
            other => Err(FeedError::decode(format!("unknown connection status '{other}'"))),
        },
    }
}

/// Encode an event frame; critical events go out as `alert`.
pub fn encode_event(event: &Event) -> String {
    let kind = if event.is_critical() { "alert" } else { "log_entry" };
    json!({ "type": kind, "data": event }).to_string()
}

/// Encode a connection status frame.
pub fn encode_status(state: ConnectionState) -> String {
    json!({
        "type": "connection_status",
        "status": state,
        "timestamp": Utc::now().to_rfc3339(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_alert_frame() {
        let line = r#"{"type":"alert","data":{"id":"alert-1","timestamp":"2026-03-01T10:00:00Z","message":"HOST NOTIFICATION: Skanem_10G_SW is DOWN","level":"critical","source":"nagios","hostname":"Skanem_10G_SW","status":"DOWN"}}"#;
        let FeedMessage::Event(event) = decode_message(line).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.id().as_str(), "alert-1");
        assert_eq!(event.level(), Level::Critical);
        assert_eq!(event.source(), &Source::Nagios);
        assert_eq!(event.hostname(), Some("Skanem_10G_SW"));
        assert_eq!(event.status(), Some(&HostState::Down));
    }

    #[test]
    fn test_decode_naive_timestamp_without_source() {
        // The log-tail relay sends naive timestamps and no source.
        let line = r#"{"type":"log_entry","data":{"timestamp":"2026-03-01T10:00:00.123456","message":"disk ok","level":"info","id":"6f1c"}}"#;
        let FeedMessage::Event(event) = decode_message(line).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.source(), &Source::System);
        assert_eq!(event.timestamp().to_rfc3339(), "2026-03-01T10:00:00.123456+00:00");
    }

    #[test]
    fn test_unknown_level_degrades_to_info() {
        let line = r#"{"type":"log_entry","data":{"message":"??","level":"apocalyptic"}}"#;
        let FeedMessage::Event(event) = decode_message(line).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(event.level(), Level::Info);
        assert!(event.id().as_str().starts_with("log-"));
    }

    #[test]
    fn test_decode_status_frame() {
        let line = r#"{"type":"connection_status","status":"connected","timestamp":"2026-03-01T10:00:00"}"#;
        assert_eq!(
            decode_message(line).unwrap(),
            FeedMessage::Status(ConnectionState::Connected)
        );
        assert!(decode_message(r#"{"type":"connection_status","status":"flapping"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_message("not json").unwrap_err();
        assert!(!err.is_transport());
        assert!(decode_message(r#"{"type":"heartbeat"}"#).is_err());
    }

    #[test]
    fn test_encode_event_uses_alert_type_for_critical() {
        let event = Event::new(Level::Critical, "down").with_source(Source::Nagios);
        let line = encode_event(&event);
        assert!(line.contains(r#""type":"alert""#));
        assert_eq!(decode_message(&line).unwrap(), FeedMessage::Event(event));
    }
}
