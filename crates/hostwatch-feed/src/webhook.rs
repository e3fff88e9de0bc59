//! HTTP listener turning Nagios notifications into events.
//!
//! Routes:
//! - `POST /nagios-webhook` with `{"host_name","service_name","state","output"}`
//! - `GET /add-log?message=...&error=true` for manual injection
//!
//! A bind failure reports a single `error` status.

use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use hostwatch_core::{ConnectionState, Event, HostState, Level, Source};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::FeedError;
use crate::source::{EventSource, FeedHandle, FeedSink};
use crate::tail::classify_line;

/// Nagios notification payload; every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NagiosNotification {
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl NagiosNotification {
    /// Map onto an event; DOWN, CRITICAL and WARNING states are critical.
    pub fn into_event(self) -> Event {
        let host = self.host_name.unwrap_or_else(|| "Unknown Host".to_string());
        let service = self.service_name.unwrap_or_else(|| "Unknown Service".to_string());
        let state = self.state.unwrap_or_else(|| "UNKNOWN".to_string());
        let output = self.output.unwrap_or_else(|| "No details available".to_string());

        let level = match state.to_ascii_uppercase().as_str() {
            "DOWN" | "CRITICAL" | "WARNING" => Level::Critical,
            _ => Level::Info,
        };
        Event::new(level, format!("NAGIOS ALERT: {host}/{service} is {state} - {output}"))
            .with_source(Source::Nagios)
            .with_hostname(host)
            .with_status(HostState::from(state))
    }
}

#[derive(Debug, Deserialize)]
struct AddLogParams {
    message: String,
    #[serde(default)]
    error: bool,
}

/// Build the webhook router delivering onto `sink`.
pub fn router(sink: FeedSink) -> Router {
    Router::new()
        .route("/nagios-webhook", post(nagios_webhook))
        .route("/add-log", get(add_log))
        .with_state(sink)
}

async fn nagios_webhook(
    State(sink): State<FeedSink>,
    Json(notification): Json<NagiosNotification>,
) -> (StatusCode, Json<Value>) {
    let event = notification.into_event();
    info!(host = ?event.hostname(), level = %event.level(), "nagios notification received");
    if sink.event(event) {
        (
            StatusCode::OK,
            Json(json!({ "status": "success", "message": "Alert processed" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "message": "feed detached" })),
        )
    }
}

async fn add_log(
    State(sink): State<FeedSink>,
    Query(params): Query<AddLogParams>,
) -> Json<Value> {
    let line = if params.error {
        format!("{} host down", params.message)
    } else {
        params.message
    };
    let event = Event::new(classify_line(&line), line).with_source(Source::System);
    let success = sink.event(event);
    Json(json!({ "success": success, "message": "Log entry added" }))
}

/// [`EventSource`] serving the webhook routes on `bind`.
#[derive(Debug, Clone)]
pub struct WebhookFeed {
    bind: SocketAddr,
}

impl WebhookFeed {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }
}

impl EventSource for WebhookFeed {
    fn label(&self) -> String {
        format!("webhook:{}", self.bind)
    }

    fn attach(&mut self, sink: FeedSink) -> FeedHandle {
        let mut handle = FeedHandle::new(self.label(), sink.clone());
        let bind = self.bind;
        let label = self.label();

        handle.track(tokio::spawn(async move {
            let listener = match TcpListener::bind(bind).await {
                Ok(listener) => listener,
                Err(source) => {
                    let err = FeedError::Bind {
                        address: bind.to_string(),
                        source,
                    };
                    warn!(feed = %label, error = %err, "webhook listener failed");
                    sink.status(ConnectionState::Error);
                    return;
                }
            };
            info!(feed = %label, "webhook listener ready");
            sink.status(ConnectionState::Connected);

            if let Err(e) = axum::serve(listener, router(sink.clone())).await {
                warn!(feed = %label, error = %e, "webhook listener stopped");
                sink.status(ConnectionState::Error);
            }
        }));

        handle
    }
}
