use crate::error::SendError;
use crate::sender::traits::{ProcessMessageSender, SourceValueUpdate};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

/// Hands accepted updates to a publisher task over an unbounded channel, so the
/// dispatch path never waits on the transport.
#[derive(Debug, Clone)]
pub struct ChannelMessageSender {
    tx: UnboundedSender<SourceValueUpdate>,
}

impl ChannelMessageSender {
    pub fn new() -> (Self, UnboundedReceiver<SourceValueUpdate>) {
        let (tx, rx) = unbounded_channel();
        (ChannelMessageSender { tx }, rx)
    }
}

impl ProcessMessageSender for ChannelMessageSender {
    fn add_value(&self, update: SourceValueUpdate) -> Result<(), SendError> {
        self.tx.send(update).map_err(|_| SendError::Closed)
    }
}

/// Drains the channel in batches of at most `max_batch` updates and hands each
/// batch to `publish`. Returns once every sender is gone.
pub async fn run_publisher<F>(mut rx: UnboundedReceiver<SourceValueUpdate>, max_batch: usize, mut publish: F)
where
    F: FnMut(Vec<SourceValueUpdate>),
{
    let max_batch = max_batch.max(1);
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while batch.len() < max_batch {
            match rx.try_recv() {
                Ok(next) => batch.push(next),
                Err(_) => break,
            }
        }
        debug!("Publishing batch of {} value updates", batch.len());
        publish(batch);
    }
    info!("Value update channel closed, publisher stopped.");
}

/// Publisher used by the gateway binary: logs every update it would transmit.
pub fn log_batch(batch: Vec<SourceValueUpdate>) {
    for update in batch {
        let value = update
            .value
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());
        info!(
            "-> tag #{} '{}' = {} (quality {}, ts {})",
            update.tag_id, update.tag_name, value, update.value.quality.code, update.value.timestamp
        );
    }
}
