use crate::filter::FilterOutcome;
use crate::sender::traits::{DynamicDeadbandRecorder, FilterSink, FilteredValue};
use crate::tags::structures::TagId;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Counts filtered updates per outcome and per tag. In filter mode the records
/// are also forwarded to a channel for the statistics consumer.
#[derive(Debug, Default)]
pub struct FilterStatistics {
    per_outcome: DashMap<FilterOutcome, u64>,
    per_tag: DashMap<TagId, u64>,
    forward: Option<UnboundedSender<FilteredValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterReport {
    pub total: u64,
    pub per_outcome: BTreeMap<String, u64>,
    pub per_tag: BTreeMap<TagId, u64>,
}

impl FilterStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forward(forward: UnboundedSender<FilteredValue>) -> Self {
        FilterStatistics {
            forward: Some(forward),
            ..Self::default()
        }
    }

    pub fn count(&self, outcome: FilterOutcome) -> u64 {
        self.per_outcome.get(&outcome).map(|c| *c).unwrap_or(0)
    }

    pub fn count_for_tag(&self, tag_id: TagId) -> u64 {
        self.per_tag.get(&tag_id).map(|c| *c).unwrap_or(0)
    }

    pub fn report(&self) -> FilterReport {
        let per_outcome: BTreeMap<String, u64> = self
            .per_outcome
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), *entry.value()))
            .collect();
        let per_tag = self.per_tag.iter().map(|entry| (*entry.key(), *entry.value())).collect();
        FilterReport {
            total: per_outcome.values().sum(),
            per_outcome,
            per_tag,
        }
    }
}

impl FilterSink for FilterStatistics {
    fn send_filtered(&self, filtered: FilteredValue) {
        *self.per_outcome.entry(filtered.outcome).or_insert(0) += 1;
        *self.per_tag.entry(filtered.tag_id).or_insert(0) += 1;
        if let Some(forward) = &self.forward {
            let tag_id = filtered.tag_id;
            if forward.send(filtered).is_err() {
                warn!("Filter statistics channel closed, dropping record of tag #{}", tag_id);
            }
        }
    }
}

/// Counts accepted transitions per tag. Feeds an adaptive time deadband
/// controller that lives outside the gateway.
#[derive(Debug, Default)]
pub struct ActivityRecorder {
    counts: DashMap<TagId, u64>,
}

impl ActivityRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, tag_id: TagId) -> u64 {
        self.counts.get(&tag_id).map(|c| *c).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|entry| *entry.value()).sum()
    }
}

impl DynamicDeadbandRecorder for ActivityRecorder {
    fn record_tag(&self, tag_id: TagId) {
        *self.counts.entry(tag_id).or_insert(0) += 1;
    }
}
