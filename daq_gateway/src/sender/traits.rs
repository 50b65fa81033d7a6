use crate::error::SendError;
use crate::filter::FilterOutcome;
use crate::tags::structures::{Quality, TagId, ValueRecord, ValueVariant};
use serde::Serialize;

/// An accepted update on its way to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceValueUpdate {
    pub tag_id: TagId,
    pub tag_name: String,
    pub value: ValueRecord,
}

/// A suppressed update reported to the filter statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredValue {
    pub tag_id: TagId,
    pub tag_name: String,
    pub value: ValueVariant,
    pub value_description: Option<String>,
    pub quality: Quality,
    pub timestamp: i64,
    pub outcome: FilterOutcome,
}

impl FilteredValue {
    pub fn outcome_code(&self) -> i16 {
        self.outcome.code()
    }
}

/// Transport towards the server. Called concurrently from any tag's dispatch path.
pub trait ProcessMessageSender: Send + Sync {
    fn add_value(&self, update: SourceValueUpdate) -> Result<(), SendError>;
}

/// Side channel for suppressed updates. Best effort, must not block.
pub trait FilterSink: Send + Sync {
    fn send_filtered(&self, filtered: FilteredValue);
}

/// Notified on every accepted transition of a tag.
pub trait DynamicDeadbandRecorder: Send + Sync {
    fn record_tag(&self, tag_id: TagId);
}
