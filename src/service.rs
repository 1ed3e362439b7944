//! Tempo service: one broadcast queue, one fan-out sink, one drainer.
//!
//! The producer side calls [`TempoService::publish_tempo`] whenever a new
//! reading is available; transport sessions call [`TempoService::connect`]
//! and [`TempoService::disconnect`]. When the last session leaves, either
//! explicitly or by dropping its [`Subscription`], the backlog no longer
//! has anyone to go to and the queue is reset.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, DEFAULT_LOG_RETENTION};
use crate::core::clock::Clock;
use crate::core::drainer::{spawn_drainer, DrainerHandle};
use crate::core::error::TempoError;
use crate::core::queue::{BroadcastQueue, QueueStats};
use crate::core::sink::{BroadcastSink, FanoutSink};
use crate::core::subscriber::{SubscriberId, Subscription};
use crate::core::tempo::TempoUpdate;

#[derive(Debug)]
pub struct TempoService {
    queue: Arc<BroadcastQueue>,
    sink: Arc<FanoutSink>,
    clock: Arc<dyn Clock>,
    drainer: Mutex<Option<DrainerHandle>>,
}

impl TempoService {
    /// Builds the service and spawns its drainer on the current runtime.
    ///
    /// A queue config without `log_retention` keeps the newest
    /// [`DEFAULT_LOG_RETENTION`] emitted messages.
    pub fn start(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, TempoError> {
        config.validate()?;

        let mut queue_config = config.queue.clone();
        let retention = *queue_config
            .log_retention
            .get_or_insert(DEFAULT_LOG_RETENTION);

        let queue = Arc::new(BroadcastQueue::new(
            queue_config,
            config.subscribers.initial_count_hint,
        )?);
        let sink = Arc::new(
            FanoutSink::new(
                config.subscribers.max_subscribers,
                config.subscribers.channel_capacity,
            )?
            .bound_to(Arc::clone(&queue)),
        );

        let drainer = spawn_drainer(
            Arc::clone(&queue),
            Arc::clone(&sink) as Arc<dyn BroadcastSink>,
            Arc::clone(&clock),
            Duration::from_millis(config.drainer.poll_interval_ms),
        )?;

        info!(
            target: "tempocast::service",
            capacity = config.queue.capacity,
            min_interval_ms = config.queue.min_interval_ms,
            policy = %config.queue.overflow_policy,
            log_retention = retention,
            "tempo service started"
        );

        Ok(Self {
            queue,
            sink,
            clock,
            drainer: Mutex::new(Some(drainer)),
        })
    }

    #[inline]
    pub fn queue(&self) -> &Arc<BroadcastQueue> {
        &self.queue
    }

    #[inline]
    pub fn sink(&self) -> &Arc<FanoutSink> {
        &self.sink
    }

    /// Enqueues an opaque payload stamped with the service clock.
    pub fn publish(&self, payload: impl Into<Bytes>) -> bool {
        self.queue.enqueue(payload, self.clock.now_ms())
    }

    /// Encodes and enqueues a tempo reading. `Ok(false)` means the queue was
    /// full and the reading was shed.
    pub fn publish_tempo(&self, update: TempoUpdate) -> Result<bool, TempoError> {
        let payload = update.to_payload()?;
        Ok(self.publish(payload))
    }

    pub fn connect(&self) -> Result<Subscription, TempoError> {
        self.sink.subscribe()
    }

    /// Removes a session. The queue is reset once no subscriber remains.
    pub fn disconnect(&self, id: &SubscriberId) -> Result<(), TempoError> {
        self.sink.unsubscribe(id)
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn is_running(&self) -> bool {
        self.drainer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the drainer and discards any backlog.
    pub async fn shutdown(&self) -> Result<(), TempoError> {
        let handle = self.drainer.lock().take();
        let handle = handle.ok_or(TempoError::DrainerClosed)?;
        handle.stop().await;
        self.queue.reset();
        info!(target: "tempocast::service", "tempo service stopped");
        Ok(())
    }
}
