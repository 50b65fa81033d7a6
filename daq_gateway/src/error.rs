use crate::tags::structures::{DataType, TagId};
use thiserror::Error;

/// Raw value could not be converted to the declared tag type.
#[derive(Debug, Error, PartialEq)]
pub enum CastError {
    #[error("cannot convert '{value}' to {target:?}")]
    Unsupported { value: String, target: DataType },
    #[error("'{value}' is out of range for {target:?}")]
    OutOfRange { value: String, target: DataType },
    #[error("cannot parse '{input}' as {target:?}")]
    Parse { input: String, target: DataType },
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("downstream sender is closed")]
    Closed,
}

/// Reasons an update is dropped at the dispatch boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("tag #{0} is not registered")]
    UnknownTag(TagId),
    #[error("state of tag #{0} is poisoned")]
    PoisonedTag(TagId),
}
