pub mod simulated;
pub mod traits;
