pub mod cast;
pub mod engine;
pub mod structures;
