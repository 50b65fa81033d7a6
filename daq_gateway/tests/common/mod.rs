#![allow(dead_code)]

use daq_gateway::error::SendError;
use daq_gateway::sender::statistics::ActivityRecorder;
use daq_gateway::sender::traits::{FilterSink, FilteredValue, ProcessMessageSender, SourceValueUpdate};
use daq_gateway::sender::Dispatcher;
use daq_gateway::tags::engine::TagEngine;
use daq_gateway::tags::structures::{
    DataType, DeadbandType, Quality, TagAddress, TagId, TagSnapshot, ValueRecord, ValueVariant,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

/// Downstream sender that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSender {
    updates: Mutex<Vec<SourceValueUpdate>>,
    fail: AtomicBool,
}

impl RecordingSender {
    pub fn updates(&self) -> Vec<SourceValueUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn values(&self) -> Vec<Option<ValueVariant>> {
        self.updates().into_iter().map(|u| u.value.value).collect()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ProcessMessageSender for RecordingSender {
    fn add_value(&self, update: SourceValueUpdate) -> Result<(), SendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        self.updates.lock().unwrap().push(update);
        Ok(())
    }
}

/// Filter sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingFilterSink {
    filtered: Mutex<Vec<FilteredValue>>,
}

impl RecordingFilterSink {
    pub fn filtered(&self) -> Vec<FilteredValue> {
        self.filtered.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.filtered.lock().unwrap().len()
    }
}

impl FilterSink for RecordingFilterSink {
    fn send_filtered(&self, filtered: FilteredValue) {
        self.filtered.lock().unwrap().push(filtered);
    }
}

/// Dispatcher wired to recording collaborators.
pub struct Harness {
    pub engine: Arc<TagEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub sender: Arc<RecordingSender>,
    pub filter_sink: Arc<RecordingFilterSink>,
    pub recorder: Arc<ActivityRecorder>,
}

impl Harness {
    /// Must be called from within a tokio runtime.
    pub fn new(tags: Vec<TagSnapshot>) -> Self {
        let engine = Arc::new(TagEngine::new());
        for tag in tags {
            engine.register_tag(tag);
        }
        let sender = Arc::new(RecordingSender::default());
        let filter_sink = Arc::new(RecordingFilterSink::default());
        let recorder = Arc::new(ActivityRecorder::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&engine),
            sender.clone(),
            filter_sink.clone(),
            recorder.clone(),
            Handle::current(),
        ));
        Harness {
            engine,
            dispatcher,
            sender,
            filter_sink,
            recorder,
        }
    }

    pub fn current(&self, id: TagId) -> Option<ValueRecord> {
        self.engine.read_value(id)
    }
}

pub fn double_tag(id: TagId) -> TagSnapshot {
    TagSnapshot::new(id, format!("Test/Tag{}", id), DataType::Double, TagAddress::default())
}

pub fn deadband_tag(id: TagId, kind: DeadbandType, size: f32) -> TagSnapshot {
    TagSnapshot::new(
        id,
        format!("Test/Deadband{}", id),
        DataType::Double,
        TagAddress::default().with_value_deadband(kind, size),
    )
}

pub fn time_deadband_tag(id: TagId, millis: u64) -> TagSnapshot {
    TagSnapshot::new(
        id,
        format!("Test/TimeDeadband{}", id),
        DataType::Double,
        TagAddress::default().with_time_deadband(millis),
    )
}

/// Tag whose current value is already set.
pub fn with_current(mut tag: TagSnapshot, value: Option<ValueVariant>, desc: &str, quality: Quality, timestamp: i64) -> TagSnapshot {
    tag.current_value = Some(ValueRecord::new(value, desc, quality, timestamp));
    tag
}

pub fn float(v: f64) -> ValueVariant {
    ValueVariant::Float(v)
}
