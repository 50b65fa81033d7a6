use crate::sender::traits::{DynamicDeadbandRecorder, ProcessMessageSender, SourceValueUpdate};
use crate::tags::structures::{TagSnapshot, ValueRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The accepted-update path shared by direct dispatch and time-deadband flushes.
///
/// `apply` runs under the tag lock; `forward` must be called after the lock
/// has been released.
pub struct ValueDelivery {
    sender: Arc<dyn ProcessMessageSender>,
    recorder: Arc<dyn DynamicDeadbandRecorder>,
    accepted: AtomicU64,
    send_failures: AtomicU64,
    contract_violations: AtomicU64,
}

impl ValueDelivery {
    pub fn new(sender: Arc<dyn ProcessMessageSender>, recorder: Arc<dyn DynamicDeadbandRecorder>) -> Self {
        ValueDelivery {
            sender,
            recorder,
            accepted: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            contract_violations: AtomicU64::new(0),
        }
    }

    /// Makes `candidate` the current value of `tag`. Returns the update to
    /// forward, or `None` if the assignment turned out to be a no-op.
    pub fn apply(&self, tag: &mut TagSnapshot, candidate: ValueRecord) -> Option<SourceValueUpdate> {
        match tag.update(candidate) {
            Some(value) => Some(SourceValueUpdate {
                tag_id: tag.id,
                tag_name: tag.name.clone(),
                value,
            }),
            None => {
                // The filter should have reported REPEATED_VALUE before we got here.
                self.contract_violations.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Accepted update for tag #{} is an unchanged OK value, not sending it. The filter should have caught this.",
                    tag.id
                );
                None
            }
        }
    }

    pub fn forward(&self, update: SourceValueUpdate) {
        let tag_id = update.tag_id;
        debug!("Sending update of tag #{} to the server", tag_id);
        match self.sender.add_value(update) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                self.recorder.record_tag(tag_id);
            }
            Err(e) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                error!("Failed to send update of tag #{}: {}", tag_id, e);
            }
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    pub fn contract_violations(&self) -> u64 {
        self.contract_violations.load(Ordering::Relaxed)
    }
}
