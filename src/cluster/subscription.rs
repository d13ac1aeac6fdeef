//! Live pump: one task per subscription, parked on the partition notifier.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cluster::partition::Partition;
use crate::inspector::filter::matches;
use crate::inspector::message::{Message, MessageFilter};
use crate::inspector::source::{LiveBatch, LiveEvent, LiveSubscription, SubscriptionHandle};

/// Cancels the pump on close or drop.
pub struct PumpHandle {
    token: CancellationToken,
}

impl SubscriptionHandle for PumpHandle {
    fn close(&self) {
        self.token.cancel();
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

pub(crate) struct PumpSettings {
    pub batch_limit: usize,
    pub poll_interval: Duration,
    pub channel_capacity: usize,
}

pub(crate) fn open_subscription(
    topic: String,
    partition: Arc<RwLock<Partition>>,
    filter: MessageFilter,
    settings: PumpSettings,
) -> LiveSubscription {
    let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
    let token = CancellationToken::new();

    let (notifier, from_offset) = {
        let p = partition.read();
        (p.new_data_notifier.clone(), p.high_watermark())
    };

    tokio::spawn(run_pump(
        topic,
        partition,
        notifier,
        filter,
        from_offset,
        settings,
        tx,
        token.clone(),
    ));

    LiveSubscription {
        handle: Box::new(PumpHandle { token }),
        events: rx,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pump(
    topic: String,
    partition: Arc<RwLock<Partition>>,
    notifier: Arc<Notify>,
    filter: MessageFilter,
    mut next_offset: i64,
    settings: PumpSettings,
    tx: mpsc::Sender<LiveEvent>,
    token: CancellationToken,
) {
    let partition_id = partition.read().id;
    debug!(topic = %topic, partition = partition_id, from = next_offset, "Live pump started");

    loop {
        // Register interest before reading so an append in between is not missed.
        let notified = notifier.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let (records, bounds) = {
            let p = partition.read();
            (p.read(next_offset, settings.batch_limit), p.bounds())
        };

        if let Some(last) = records.last() {
            next_offset = last.offset + 1;
            let messages: Vec<Message> = records
                .iter()
                .map(|r| r.to_message(partition_id))
                .filter(|m| matches(m, &filter))
                .collect();

            let batch = LiveBatch {
                partition: partition_id,
                beginning_offset: bounds.beginning_offset,
                end_offset: bounds.end_offset,
                messages,
            };

            tokio::select! {
                _ = token.cancelled() => break,
                sent = tx.send(LiveEvent::Batch(batch)) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = &mut notified => {}
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }

    debug!(topic = %topic, partition = partition_id, "Live pump stopped");
}
