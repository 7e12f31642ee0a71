// =============================================================================
// publisher.rs — THE REDIS PROCESS SERVER
// =============================================================================
//
// The scheduler generates follow-up documents; somebody has to hand them
// to the outside world. This module drains escalation events from the
// crossbeam outbox and delivers them to Redis, where the document
// formatter (and whoever else cares about lapsed statutory deadlines)
// is subscribed on the other end.
//
// Delivery is belt-and-suspenders:
// 1. PUBLISH to a pub/sub channel, for anyone listening right now
// 2. ZADD into a sorted set scored by escalation timestamp, for anyone
//    who was down when the deadline lapsed and needs to catch up
//
// Pub/sub is fire-and-forget; the sorted set is the durable event log.
// A formatter that restarts can replay everything it missed, which
// matters, because "the follow-up letter was never rendered" is not an
// acceptable line in a case chronology.
// =============================================================================

use anyhow::Result;
use crossbeam_channel::Receiver;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::models::EscalationEvent;

/// Drains the outbox and delivers escalation events to Redis. Holds the
/// receiving end of the channel; the scheduler holds the sending end.
pub struct RedisPublisher {
    config: Arc<Config>,
    receiver: Receiver<EscalationEvent>,
    shutdown: watch::Receiver<bool>,
    stats: Arc<PublisherStats>,
}

/// Delivery counters for the curious.
pub struct PublisherStats {
    pub events_published: portable_atomic::AtomicU64,
    pub events_persisted: portable_atomic::AtomicU64,
    pub publish_errors: portable_atomic::AtomicU64,
    pub batches_sent: portable_atomic::AtomicU64,
}

impl PublisherStats {
    pub fn new() -> Self {
        Self {
            events_published: portable_atomic::AtomicU64::new(0),
            events_persisted: portable_atomic::AtomicU64::new(0),
            publish_errors: portable_atomic::AtomicU64::new(0),
            batches_sent: portable_atomic::AtomicU64::new(0),
        }
    }
}

/// A serializable snapshot of publisher stats.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublisherSnapshot {
    pub events_published: u64,
    pub events_persisted: u64,
    pub publish_errors: u64,
    pub batches_sent: u64,
}

impl RedisPublisher {
    /// # Arguments
    /// * `config` - The global configuration
    /// * `receiver` - The receiving end of the outbox channel
    /// * `shutdown` - Watch channel for graceful shutdown signaling
    pub fn new(
        config: Arc<Config>,
        receiver: Receiver<EscalationEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, Arc<PublisherStats>) {
        let stats = Arc::new(PublisherStats::new());
        let stats_clone = Arc::clone(&stats);
        (
            Self {
                config,
                receiver,
                shutdown,
                stats,
            },
            stats_clone,
        )
    }

    /// Run the publisher loop until shutdown.
    ///
    /// Each cycle drains up to a batch's worth of events from the outbox,
    /// delivers them, and sleeps briefly when the channel is quiet.
    /// Batching keeps Redis round-trips proportional to escalation
    /// sweeps, not to individual documents.
    pub async fn run(self) -> Result<()> {
        info!(
            channel = %self.config.redis_channel,
            sorted_set = %self.config.redis_sorted_set,
            "Redis publisher starting — follow-up documents will be delivered"
        );

        // Connect to Redis with retry. The engine keeps escalating while
        // we wait; events queue in the outbox.
        let client = redis::Client::open(self.config.redis_url.as_str())?;
        let mut con = loop {
            match client.get_multiplexed_async_connection().await {
                Ok(con) => {
                    info!("Redis connection established");
                    break con;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to connect to Redis — retrying in 5 seconds");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    if *self.shutdown.borrow() {
                        info!("Shutdown received during Redis connection retry — exiting");
                        return Ok(());
                    }
                }
            }
        };

        const BATCH_SIZE: usize = 50;
        let mut batch: Vec<EscalationEvent> = Vec::with_capacity(BATCH_SIZE);

        loop {
            if *self.shutdown.borrow() {
                // Drain what's left; an event stranded in a dead channel
                // is a follow-up letter that never existed.
                info!("Shutdown signal received — draining remaining events");
                while let Ok(event) = self.receiver.try_recv() {
                    batch.push(event);
                }
                if !batch.is_empty() {
                    if let Err(e) = self.publish_batch(&mut con, &batch).await {
                        error!(error = %e, "Failed to publish final batch during shutdown");
                    }
                }
                info!("Redis publisher shutting down");
                return Ok(());
            }

            batch.clear();
            while batch.len() < BATCH_SIZE {
                match self.receiver.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(crossbeam_channel::TryRecvError::Empty) => break,
                    Err(crossbeam_channel::TryRecvError::Disconnected) => {
                        info!("Outbox disconnected — publisher shutting down");
                        return Ok(());
                    }
                }
            }

            if batch.is_empty() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }

            if let Err(e) = self.publish_batch(&mut con, &batch).await {
                error!(
                    error = %e,
                    batch_size = batch.len(),
                    "Failed to publish batch to Redis — events may be lost!"
                );
                self.stats
                    .publish_errors
                    .fetch_add(batch.len() as u64, portable_atomic::Ordering::Relaxed);
            }
        }
    }

    /// Deliver one batch: PUBLISH for the live subscribers, ZADD for the
    /// durable log, chronologically scored by escalation time.
    async fn publish_batch(
        &self,
        con: &mut redis::aio::MultiplexedConnection,
        batch: &[EscalationEvent],
    ) -> Result<()> {
        use portable_atomic::Ordering;

        for event in batch {
            let json = serde_json::to_string(event)?;

            let _: () = con
                .publish(&self.config.redis_channel, &json)
                .await
                .map_err(|e| {
                    error!(
                        error = %e,
                        event_id = %event.id,
                        dispute_id = %event.dispute_id,
                        "Failed to PUBLISH event"
                    );
                    e
                })?;

            self.stats.events_published.fetch_add(1, Ordering::Relaxed);

            let score = event.escalated_at.timestamp() as f64;
            let _: () = con
                .zadd(&self.config.redis_sorted_set, &json, score)
                .await
                .map_err(|e| {
                    error!(
                        error = %e,
                        event_id = %event.id,
                        "Failed to ZADD event to sorted set"
                    );
                    e
                })?;

            self.stats.events_persisted.fetch_add(1, Ordering::Relaxed);

            info!(
                event_id = %event.id,
                dispute_id = %event.dispute_id,
                creditor = %event.creditor,
                document = %event.document.name,
                "Escalation event delivered — the formatter has its marching orders"
            );
        }

        self.stats.batches_sent.fetch_add(1, Ordering::Relaxed);

        debug!(
            batch_size = batch.len(),
            total_published = self.stats.events_published.load(Ordering::Relaxed),
            "Batch published successfully"
        );

        Ok(())
    }

    /// Get a snapshot of publisher statistics.
    pub fn snapshot(stats: &PublisherStats) -> PublisherSnapshot {
        use portable_atomic::Ordering;
        PublisherSnapshot {
            events_published: stats.events_published.load(Ordering::Relaxed),
            events_persisted: stats.events_persisted.load(Ordering::Relaxed),
            publish_errors: stats.publish_errors.load(Ordering::Relaxed),
            batches_sent: stats.batches_sent.load(Ordering::Relaxed),
        }
    }
}
