pub mod deadband;
pub mod value_filter;

pub use value_filter::{classify, FilterOutcome};
