use crate::tags::structures::ValueVariant;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;

/// Configuration of one piece of equipment (one driver instance).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EquipmentConfig {
    pub id: String,        // Unique identifier, referenced by tags
    pub name: String,      // User-friendly name
    pub scan_rate_ms: u64, // How often the acquisition loop polls this equipment
    // Driver addresses reported as unavailable, for exercising invalidation paths
    #[serde(default)]
    pub unavailable: Vec<String>,
}

/// Represents a request to read a tag from the equipment.
#[derive(Debug, Clone)]
pub struct TagRequest {
    pub address: String, // Driver-specific address (e.g. "sine:10:60000")
}

/// Per-address result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverReading {
    Value {
        value: ValueVariant,
        description: Option<String>,
        timestamp: i64,
    },
    Invalid {
        quality_code: i16,
        description: String,
    },
}

// Type alias for results from driver operations
pub type DriverResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Trait implemented by equipment drivers.
#[async_trait]
pub trait EquipmentDriver: Send + Sync {
    /// Get the configuration of this driver instance.
    fn config(&self) -> &EquipmentConfig;

    /// Connect to the underlying equipment.
    async fn connect(&self) -> DriverResult<()>;

    /// Disconnect from the underlying equipment.
    async fn disconnect(&self) -> DriverResult<()>;

    /// Returns Ok(()) if connected, Err otherwise.
    async fn check_status(&self) -> DriverResult<()>;

    /// Read a batch of tags. Returns a map of address to reading.
    async fn read_tags(&self, tags: &[TagRequest]) -> DriverResult<HashMap<String, DriverReading>>;

    /// Short name of the driver kind, shown by the status API.
    fn kind(&self) -> &'static str;
}
