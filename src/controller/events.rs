//! Push-event subscription to the controller.
//!
//! The inbound channel is not guaranteed to stay open: the subscription task
//! closes a broken stream immediately, reconciles once against the
//! point-in-time status so the ranking does not stay silently stale, and
//! reopens the stream after a fixed backoff, forever. Consumers only ever see
//! buzz/result callbacks or silence.

use std::{sync::Arc, time::Duration};

use eventsource_stream::{Event, Eventsource};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::ControllerClient;

/// SSE event name carrying a single buzz.
const EVENT_BUZZER: &str = "buzzer";
/// SSE event name carrying the round-end ranking.
const EVENT_RESULT: &str = "result";
/// Fixed delay before reopening a dropped event stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// Number of entries a synthesized fallback result carries.
const RESULT_TOP_N: usize = 3;

/// One buzz notification from the controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzNotice {
    /// Zero-based position of the team in the roster.
    pub team_index: usize,
    /// Press sequence number assigned by the controller.
    #[serde(default)]
    pub order_no: u64,
    /// Controller-relative press timestamp in milliseconds.
    #[serde(default)]
    pub timestamp: u64,
}

/// Round-end notification. Always a full replacement of the ranking, never a
/// delta — the same shape arrives from the live stream and from the fallback
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResultNotice {
    /// Up to three roster indices, first press first.
    pub top3: Vec<usize>,
}

/// Consumer of inbound push events. Implementations must return quickly;
/// they are invoked on the subscription task.
pub trait PushSink: Send + Sync {
    /// One distinct buzz notification.
    fn buzz(&self, notice: BuzzNotice);
    /// One authoritative round result.
    fn result(&self, notice: ResultNotice);
}

/// Inbound event as forwarded to channel-based sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// A buzz notification.
    Buzz(BuzzNotice),
    /// A round result.
    Result(ResultNotice),
}

impl PushSink for mpsc::UnboundedSender<PushEvent> {
    fn buzz(&self, notice: BuzzNotice) {
        let _ = self.send(PushEvent::Buzz(notice));
    }

    fn result(&self, notice: ResultNotice) {
        let _ = self.send(PushEvent::Result(notice));
    }
}

/// Handle owning the background subscription task.
///
/// Dropping the handle (or calling [`close`](Self::close)) stops the task:
/// no callback fires afterwards and the reconnect timer is torn down.
pub struct EventChannel {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl EventChannel {
    /// Open the subscription and keep it alive until closed.
    pub fn open(client: ControllerClient, sink: Arc<dyn PushSink>) -> Self {
        let (shutdown, watcher) = watch::channel(false);
        let task = tokio::spawn(run_subscription(client, sink, watcher));
        Self { shutdown, task }
    }

    /// Stop the subscription.
    pub fn close(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_subscription(
    client: ControllerClient,
    sink: Arc<dyn PushSink>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        let mut was_connected = false;
        match client.open_event_stream().await {
            Ok(response) => {
                info!(base_url = client.base_url(), "controller event stream connected");
                was_connected = true;
                let stream = response.bytes_stream().eventsource();
                tokio::pin!(stream);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        item = stream.next() => match item {
                            Some(Ok(event)) => dispatch(sink.as_ref(), &event),
                            Some(Err(err)) => {
                                warn!(error = %err, "controller event stream failed");
                                break;
                            }
                            None => {
                                warn!("controller closed the event stream");
                                break;
                            }
                        },
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to open controller event stream");
            }
        }

        if was_connected {
            reconcile_from_status(&client, sink.as_ref()).await;
        }

        tokio::select! {
            _ = shutdown.changed() => return,
            _ = sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Route one SSE frame to the sink. Malformed payloads are discarded; unknown
/// event names and keep-alive comments are ignored.
fn dispatch(sink: &dyn PushSink, event: &Event) {
    match event.event.as_str() {
        EVENT_BUZZER => match serde_json::from_str::<BuzzNotice>(&event.data) {
            Ok(notice) => sink.buzz(notice),
            Err(err) => warn!(error = %err, data = %event.data, "discarding malformed buzz event"),
        },
        EVENT_RESULT => match serde_json::from_str::<ResultNotice>(&event.data) {
            Ok(notice) => sink.result(notice),
            Err(err) => {
                warn!(error = %err, data = %event.data, "discarding malformed result event");
            }
        },
        _ => {}
    }
}

/// One fallback reconciliation after a channel error: when the controller
/// already holds a non-empty press order, synthesize a single result so the
/// consumer catches up before the stream is back.
async fn reconcile_from_status(client: &ControllerClient, sink: &dyn PushSink) {
    match client.status().await {
        Ok(status) if !status.press_order.is_empty() => {
            let top3 = status.press_order.into_iter().take(RESULT_TOP_N).collect();
            info!(?top3, "reconciled ranking from controller status");
            sink.result(ResultNotice { top3 });
        }
        Ok(_) => {}
        Err(err) => debug!(error = %err, "status reconciliation failed"),
    }
}
