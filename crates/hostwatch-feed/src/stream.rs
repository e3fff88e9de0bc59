//! Streaming feed over TCP: newline-delimited wire frames.
//!
//! One connection per attachment. A connect failure or read error yields a
//! single `error` status and ends the attachment; a clean EOF yields
//! `disconnected`. Frames that are not UTF-8 or fail to decode are skipped
//! with a warning.

use hostwatch_core::ConnectionState;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::source::{EventSource, FeedHandle, FeedSink};
use crate::wire::{FeedMessage, decode_message};

/// [`EventSource`] reading wire frames from `host:port`.
#[derive(Debug, Clone)]
pub struct StreamFeed {
    address: String,
}

impl StreamFeed {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl EventSource for StreamFeed {
    fn label(&self) -> String {
        format!("tcp://{}", self.address)
    }

    fn attach(&mut self, sink: FeedSink) -> FeedHandle {
        let mut handle = FeedHandle::new(self.label(), sink.clone());
        let address = self.address.clone();
        let label = self.label();

        handle.track(tokio::spawn(async move {
            let stream = match TcpStream::connect(&address).await {
                Ok(stream) => stream,
                Err(source) => {
                    let err = FeedError::Connect { address, source };
                    warn!(feed = %label, error = %err, "stream feed unreachable");
                    sink.status(ConnectionState::Error);
                    return;
                }
            };
            debug!(feed = %label, "stream connected");
            sink.status(ConnectionState::Connected);

            match pump_frames(stream, &sink).await {
                Ok(()) => {
                    debug!(feed = %label, "stream closed by peer");
                    sink.status(ConnectionState::Disconnected);
                }
                Err(source) => {
                    let err = FeedError::Read { feed: label.clone(), source };
                    warn!(feed = %label, error = %err, "stream feed dropped");
                    sink.status(ConnectionState::Error);
                }
            }
        }));

        handle
    }
}

/// Decode frames from `reader` onto `sink` until EOF or the sink closes.
///
/// Frames are split on raw newlines; a frame that is not UTF-8 or not a
/// valid message is skipped.
pub async fn pump_frames<R>(reader: R, sink: &FeedSink) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frames = BufReader::new(reader).split(b'\n');
    while let Some(frame) = frames.next_segment().await? {
        let line = match std::str::from_utf8(&frame) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, len = frame.len(), "skipping frame that is not UTF-8");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let delivered = match decode_message(line) {
            Ok(FeedMessage::Event(event)) => sink.event(event),
            Ok(FeedMessage::Status(state)) => sink.status(state),
            Err(e) => {
                warn!(error = %e, "skipping malformed frame");
                true
            }
        };
        if !delivered {
            break;
        }
    }
    Ok(())
}
