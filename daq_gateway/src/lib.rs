//! Acquisition-side gateway: reads equipment, filters value updates and hands
//! the accepted ones to the server transport.

pub mod api;
pub mod config;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod logging;
pub mod sender;
pub mod tags;
