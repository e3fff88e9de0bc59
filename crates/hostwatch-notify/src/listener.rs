//! Bridge from controller updates to the notifier.

use std::sync::Arc;

use hostwatch_stream::StreamUpdate;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bell::BellChannel;
use crate::notifier::{Notifier, Urgency};

/// Play a notification on every `AlertRaised` update, and nothing else.
///
/// Ends when the controller is dropped.
pub fn spawn_alert_listener(
    mut updates: broadcast::Receiver<StreamUpdate>,
    notifier: Arc<Notifier>,
    bell: Option<BellChannel>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(StreamUpdate::AlertRaised(event)) => {
                    let urgency = Urgency::for_event(&event);
                    debug!(id = %event.id(), urgency = ?urgency, "alert raised, notifying");
                    notifier.notify(urgency);
                    if let Some(bell) = &bell {
                        bell.ring();
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "alert listener lagged behind stream updates");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("alert listener stopped");
    })
}
