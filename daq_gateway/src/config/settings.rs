use crate::drivers::traits::EquipmentConfig;
use crate::tags::structures::{DataType, DeadbandType, TagAddress, TagId, TagMetadata, TagSnapshot};
use config::{Config, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String, // trace, debug, info, warn, error
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_level() }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FilterConfig {
    /// Forward filtered values to the statistics channel, not only count them.
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValueDeadbandConfig {
    pub kind: DeadbandType,
    pub size: f32, // Absolute tolerance or percentage, depending on kind
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TagConfig {
    pub id: TagId,
    pub name: String,
    pub equipment_id: String, // Must match an equipment id
    pub address: String,      // Driver-specific address
    pub data_type: DataType,
    #[serde(default)]
    pub value_deadband: Option<ValueDeadbandConfig>,
    #[serde(default)]
    pub time_deadband_ms: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub eng_unit: Option<String>,
}

impl TagConfig {
    pub fn tag_address(&self) -> TagAddress {
        let mut address = TagAddress::default();
        if let Some(deadband) = &self.value_deadband {
            address = address.with_value_deadband(deadband.kind, deadband.size);
        }
        if let Some(millis) = self.time_deadband_ms {
            address = address.with_time_deadband(millis);
        }
        address
    }

    /// Initial state of the tag, without a value.
    pub fn to_snapshot(&self) -> TagSnapshot {
        let mut tag = TagSnapshot::new(self.id, self.name.clone(), self.data_type, self.tag_address())
            .with_driver(self.equipment_id.clone(), self.address.clone());
        tag.metadata = TagMetadata {
            description: self.description.clone(),
            eng_unit: self.eng_unit.clone(),
        };
        tag
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)] // Clone needed for passing around
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub equipment: Vec<EquipmentConfig>,
    #[serde(default)] // Make tags optional in the config file
    pub tags: Vec<TagConfig>,
}

impl Settings {
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(config_path))
            .build()?
            .try_deserialize()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn save(&self, config_path: &Path) -> io::Result<()> {
        let toml_string = toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(config_path, toml_string)
    }

    /// Tags that can be registered: the first definition of each id whose
    /// equipment exists. Everything else is logged and skipped.
    pub fn registrable_tags(&self) -> Vec<&TagConfig> {
        let equipment: HashSet<&str> = self.equipment.iter().map(|e| e.id.as_str()).collect();
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .filter(|tag| {
                if !equipment.contains(tag.equipment_id.as_str()) {
                    warn!(
                        "Skipping tag #{} '{}': equipment '{}' is not configured",
                        tag.id, tag.name, tag.equipment_id
                    );
                    return false;
                }
                if !seen.insert(tag.id) {
                    warn!("Skipping tag #{} '{}': duplicate id", tag.id, tag.name);
                    return false;
                }
                true
            })
            .collect()
    }
}
