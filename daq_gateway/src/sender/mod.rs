pub mod channel;
pub mod delivery;
pub mod dispatch;
pub mod statistics;
pub mod time_deadband;
pub mod traits;

pub use dispatch::{DispatchStats, Dispatcher};
