use crate::error::DispatchError;
use crate::filter::value_filter::{classify, FilterOutcome};
use crate::sender::delivery::ValueDelivery;
use crate::sender::time_deadband::TimeDeadbandScheduler;
use crate::sender::traits::{DynamicDeadbandRecorder, FilterSink, FilteredValue, ProcessMessageSender};
use crate::tags::cast::cast;
use crate::tags::engine::{lock_tag, TagEngine};
use crate::tags::structures::{now_millis, Quality, TagAddress, TagId, ValueRecord, ValueVariant};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error};

/// Where the value of an update comes from.
enum Payload<'a> {
    /// Keep the tag's current value and description, change only the quality.
    Current,
    New {
        value: Option<ValueVariant>,
        value_description: Option<&'a str>,
    },
}

/// Counters exposed by the status API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    pub accepted: u64,
    pub send_failures: u64,
    pub filtered: u64,
    pub dropped: u64,
    pub pending: usize,
    pub time_deadband_flushes: u64,
    pub contract_violations: u64,
}

/// Entry point for every update leaving the acquisition side.
///
/// Casts raw values to the tag's type, runs the filter and routes the result
/// to the time deadband, the server or the filter statistics. Nothing is ever
/// reported back to the producer; failures are logged and the update dropped.
pub struct Dispatcher {
    tags: Arc<TagEngine>,
    scheduler: Arc<TimeDeadbandScheduler>,
    delivery: Arc<ValueDelivery>,
    filter_sink: Arc<dyn FilterSink>,
    filtered: AtomicU64,
    dropped: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        tags: Arc<TagEngine>,
        sender: Arc<dyn ProcessMessageSender>,
        filter_sink: Arc<dyn FilterSink>,
        recorder: Arc<dyn DynamicDeadbandRecorder>,
        runtime: Handle,
    ) -> Self {
        let delivery = Arc::new(ValueDelivery::new(sender, recorder));
        let scheduler = Arc::new(TimeDeadbandScheduler::new(Arc::clone(&delivery), runtime));
        Dispatcher {
            tags,
            scheduler,
            delivery,
            filter_sink,
            filtered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Invalidates a tag, keeping its current value. `at` defaults to now.
    pub fn send_invalid(
        &self,
        tag_id: TagId,
        quality_code: i16,
        description: Option<&str>,
        at: Option<i64>,
    ) -> Option<FilterOutcome> {
        let quality = Quality::new(quality_code, description.map(str::to_string));
        self.dispatch(tag_id, Payload::Current, quality, at)
    }

    /// Sends a new value together with an (invalid) quality.
    pub fn send_invalid_value(
        &self,
        tag_id: TagId,
        value: Option<ValueVariant>,
        value_description: Option<&str>,
        quality: Quality,
        at: Option<i64>,
    ) -> Option<FilterOutcome> {
        let payload = Payload::New {
            value,
            value_description,
        };
        self.dispatch(tag_id, payload, quality, at)
    }

    /// Normal value update. Takes the same path as an invalidation.
    pub fn send_update(
        &self,
        tag_id: TagId,
        value: Option<ValueVariant>,
        value_description: Option<&str>,
        quality: Quality,
        at: Option<i64>,
    ) -> Option<FilterOutcome> {
        self.send_invalid_value(tag_id, value, value_description, quality, at)
    }

    /// Valid value update.
    pub fn send_value(
        &self,
        tag_id: TagId,
        value: ValueVariant,
        value_description: Option<&str>,
        at: Option<i64>,
    ) -> Option<FilterOutcome> {
        self.send_update(tag_id, Some(value), value_description, Quality::ok(), at)
    }

    /// Sends the buffered time deadband candidate of a tag now.
    pub fn flush(&self, tag_id: TagId) -> bool {
        self.scheduler.flush(tag_id)
    }

    /// Replaces the filtering configuration of a tag. A buffered candidate is
    /// discarded when the time deadband gets disabled.
    pub fn reconfigure(&self, tag_id: TagId, address: TagAddress) -> bool {
        let time_deadband_enabled = address.time_deadband_enabled;
        if self.tags.update_address(tag_id, address).is_none() {
            return false;
        }
        if !time_deadband_enabled && self.scheduler.remove(tag_id) {
            debug!("Tag #{}: time deadband disabled, pending update discarded", tag_id);
        }
        true
    }

    /// Unregisters a tag and discards its buffered candidate. An update already
    /// holding the tag lock finishes first; later ones see the tag as unknown.
    pub fn remove_tag(&self, tag_id: TagId) -> bool {
        let Some(cell) = self.tags.remove_tag(tag_id) else {
            return false;
        };
        let tag = lock_tag(tag_id, &cell);
        if let Err(e) = &tag {
            error!("{}, discarding its pending update anyway", e);
        }
        self.scheduler.remove(tag_id);
        drop(tag);
        true
    }

    pub fn scheduler(&self) -> &Arc<TimeDeadbandScheduler> {
        &self.scheduler
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            accepted: self.delivery.accepted(),
            send_failures: self.delivery.send_failures(),
            filtered: self.filtered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.scheduler.len(),
            time_deadband_flushes: self.scheduler.flushes(),
            contract_violations: self.delivery.contract_violations(),
        }
    }

    fn dispatch(&self, tag_id: TagId, payload: Payload<'_>, quality: Quality, at: Option<i64>) -> Option<FilterOutcome> {
        match self.process(tag_id, payload, quality, at) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                error!("Dropping update of tag #{}: {}", tag_id, e);
                None
            }
        }
    }

    fn process(&self, tag_id: TagId, payload: Payload<'_>, quality: Quality, at: Option<i64>) -> Result<FilterOutcome, DispatchError> {
        let cell = self.tags.get_cell(tag_id).ok_or(DispatchError::UnknownTag(tag_id))?;
        let timestamp = at.unwrap_or_else(now_millis);

        let mut tag = lock_tag(tag_id, &cell)?;
        // Removed while we were waiting for the lock
        if !self.tags.is_registered(tag_id, &cell) {
            return Err(DispatchError::UnknownTag(tag_id));
        }

        let (raw_value, value_description) = match payload {
            Payload::Current => match &tag.current_value {
                Some(current) => (current.value.clone(), Some(current.value_description.clone())),
                None => (None, None),
            },
            Payload::New {
                value,
                value_description,
            } => (value, value_description.map(str::to_string)),
        };

        // A value that does not fit the declared type is dropped, the quality still goes through.
        let value = raw_value.and_then(|raw| match cast(&raw, tag.data_type) {
            Ok(casted) => Some(casted),
            Err(e) => {
                debug!("Tag #{}: {}", tag_id, e);
                None
            }
        });

        let outcome = classify(&tag, value.as_ref(), value_description.as_deref(), &quality, timestamp);

        if outcome.is_filtered() {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            // The source is back at the applied state, a buffered change is stale now
            if outcome != FilterOutcome::OldUpdate && self.scheduler.remove(tag_id) {
                debug!("Tag #{}: {} while a change was pending, pending update discarded", tag_id, outcome);
            }
            let tag_name = tag.name.clone();
            drop(tag);
            match value {
                Some(value) => self.filter_sink.send_filtered(FilteredValue {
                    tag_id,
                    tag_name,
                    value,
                    value_description,
                    quality,
                    timestamp,
                    outcome,
                }),
                None => debug!("Tag #{}: filtered ({}) before any value was set", tag_id, outcome),
            }
            return Ok(outcome);
        }

        let candidate = ValueRecord {
            value,
            value_description: value_description.unwrap_or_default(),
            quality,
            timestamp,
        };

        if tag.address.time_deadband_enabled {
            debug!("Tag #{}: passing update to the time deadband", tag_id);
            self.scheduler.add(tag_id, &cell, tag.address.time_deadband_ms, candidate);
            return Ok(outcome);
        }

        if self.scheduler.remove(tag_id) {
            debug!("Tag #{}: stale time deadband bucket removed", tag_id);
        }
        let update = self.delivery.apply(&mut tag, candidate);
        drop(tag);
        if let Some(update) = update {
            self.delivery.forward(update);
        }
        Ok(outcome)
    }
}
