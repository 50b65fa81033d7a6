use crate::sender::delivery::ValueDelivery;
use crate::tags::engine::{lock_tag, TagCell};
use crate::tags::structures::{TagId, ValueRecord};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, trace};

/// Latest candidate of a tag waiting for its time deadband to expire.
struct PendingBucket {
    cell: Arc<TagCell>,
    candidate: ValueRecord,
    /// Distinguishes this bucket from later ones of the same tag, so a stale
    /// timer never flushes a bucket it did not arm.
    generation: u64,
    timer: JoinHandle<()>,
}

/// Coalesces bursts of accepted updates per tag and sends at most one of them
/// per configured interval, always the most recent one.
pub struct TimeDeadbandScheduler {
    buckets: DashMap<TagId, PendingBucket>,
    delivery: Arc<ValueDelivery>,
    runtime: Handle,
    next_generation: AtomicU64,
    flushes: AtomicU64,
}

impl TimeDeadbandScheduler {
    pub fn new(delivery: Arc<ValueDelivery>, runtime: Handle) -> Self {
        TimeDeadbandScheduler {
            buckets: DashMap::new(),
            delivery,
            runtime,
            next_generation: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    /// Buffers `candidate` for the tag. The first candidate arms a timer of
    /// `delay_ms`; later ones replace the buffered candidate and leave the timer alone.
    pub fn add(self: &Arc<Self>, tag_id: TagId, cell: &Arc<TagCell>, delay_ms: u64, candidate: ValueRecord) {
        match self.buckets.entry(tag_id) {
            Entry::Occupied(mut entry) => {
                trace!("Tag #{}: replacing buffered candidate", tag_id);
                entry.get_mut().candidate = candidate;
            }
            Entry::Vacant(entry) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let scheduler = Arc::downgrade(self);
                let delay = Duration::from_millis(delay_ms);
                let timer = self.runtime.spawn(async move {
                    sleep(delay).await;
                    if let Some(scheduler) = scheduler.upgrade() {
                        scheduler.flush_expired(tag_id, generation);
                    }
                });
                debug!("Tag #{}: time deadband of {}ms started", tag_id, delay_ms);
                entry.insert(PendingBucket {
                    cell: Arc::clone(cell),
                    candidate,
                    generation,
                    timer,
                });
            }
        }
    }

    /// Sends the buffered candidate right away. Returns false if nothing was pending.
    pub fn flush(&self, tag_id: TagId) -> bool {
        match self.buckets.remove(&tag_id) {
            Some((_, bucket)) => {
                bucket.timer.abort();
                self.deliver(tag_id, bucket);
                true
            }
            None => false,
        }
    }

    /// Discards the buffered candidate without sending it. Idempotent.
    pub fn remove(&self, tag_id: TagId) -> bool {
        match self.buckets.remove(&tag_id) {
            Some((_, bucket)) => {
                bucket.timer.abort();
                debug!("Tag #{}: time deadband bucket removed", tag_id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, tag_id: TagId) -> bool {
        self.buckets.contains_key(&tag_id)
    }

    /// The candidate currently buffered for a tag.
    pub fn pending(&self, tag_id: TagId) -> Option<ValueRecord> {
        self.buckets.get(&tag_id).map(|bucket| bucket.candidate.clone())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn flush_expired(&self, tag_id: TagId, generation: u64) {
        match self.buckets.remove_if(&tag_id, |_, bucket| bucket.generation == generation) {
            Some((_, bucket)) => self.deliver(tag_id, bucket),
            // Flushed or removed in the meantime
            None => trace!("Tag #{}: timer fired for a bucket that is gone", tag_id),
        }
    }

    fn deliver(&self, tag_id: TagId, bucket: PendingBucket) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        let update = match lock_tag(tag_id, &bucket.cell) {
            Ok(mut tag) => self.delivery.apply(&mut tag, bucket.candidate),
            Err(e) => {
                error!("Dropping buffered update of tag #{}: {}", tag_id, e);
                return;
            }
        };
        if let Some(update) = update {
            self.delivery.forward(update);
        }
    }
}

impl Drop for TimeDeadbandScheduler {
    fn drop(&mut self) {
        for entry in self.buckets.iter() {
            entry.value().timer.abort();
        }
    }
}
