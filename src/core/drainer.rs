use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::clock::Clock;
use crate::core::error::TempoError;
use crate::core::queue::BroadcastQueue;
use crate::core::sink::BroadcastSink;

/// Handle to a running drainer task.
#[derive(Debug)]
pub struct DrainerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DrainerHandle {
    /// Signals the drainer to stop and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            debug!(target: "tempocast::drainer", error = %e, "drainer task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the periodic drainer on the current tokio runtime.
///
/// Each tick polls the queue exactly once with the clock's reading and
/// forwards any emitted message to the sink. The cadence is independent of
/// the queue's minimum interval; the queue's rate gate decides whether a
/// tick emits.
pub fn spawn_drainer(
    queue: Arc<BroadcastQueue>,
    sink: Arc<dyn BroadcastSink>,
    clock: Arc<dyn Clock>,
    cadence: Duration,
) -> Result<DrainerHandle, TempoError> {
    if cadence.is_zero() {
        return Err(TempoError::InvalidConfig(
            "drainer cadence must be non-zero".into(),
        ));
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            target: "tempocast::drainer",
            cadence_ms = cadence.as_millis() as u64,
            min_interval_ms = queue.min_interval_ms(),
            "drainer started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    drain_once(&queue, sink.as_ref(), clock.now_ms());
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!(target: "tempocast::drainer", "drainer stopped");
    });

    Ok(DrainerHandle {
        shutdown: shutdown_tx,
        task,
    })
}

/// One drainer step: poll once, deliver what comes out.
///
/// Returns the number of subscribers reached, or `None` if nothing was
/// emitted.
pub fn drain_once(queue: &BroadcastQueue, sink: &dyn BroadcastSink, now: u64) -> Option<usize> {
    let message = queue.poll_message(now)?;
    let reached = sink.deliver(&message);
    debug!(
        target: "tempocast::drainer",
        id = message.id,
        reached,
        subscribers = sink.subscriber_count(),
        backlog = queue.len(),
        "broadcast"
    );
    Some(reached)
}
