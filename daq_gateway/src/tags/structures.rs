use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable identifier of a tag.
pub type TagId = u64;

/// Current wall clock time as Unix timestamp milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Quality codes carried with every value update. `0` means the value is valid,
/// anything else is a reason for invalidity.
pub mod quality_code {
    pub const OK: i16 = 0;
    pub const OUT_OF_BOUNDS: i16 = 1;
    pub const UNSUPPORTED_TYPE: i16 = 2;
    pub const UNKNOWN: i16 = 3;
    /// Equipment did not deliver a value. Old timestamps are tolerated when leaving this state.
    pub const DATA_UNAVAILABLE: i16 = 4;
    pub const CONVERSION_ERROR: i16 = 5;
    pub const INCORRECT_NATIVE_ADDRESS: i16 = 6;
    pub const VALUE_CORRUPTED: i16 = 7;
    pub const FUTURE_SOURCE_TIMESTAMP: i16 = 8;
}

/// Represents the quality of a tag's value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Quality {
    pub code: i16,
    pub description: Option<String>,
}

impl Quality {
    pub fn new(code: i16, description: Option<String>) -> Self {
        Quality { code, description }
    }

    pub fn ok() -> Self {
        Self::default()
    }

    // Helper for invalid qualities with a reason text
    pub fn invalid(code: i16, description: impl Into<String>) -> Self {
        Quality {
            code,
            description: Some(description.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.code == quality_code::OK
    }
}

/// Possible values carried by a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueVariant {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<ValueVariant>),
}

impl ValueVariant {
    /// Numeric view used by the value deadband.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValueVariant::Int(i) => Some(*i as f64),
            ValueVariant::UInt(u) => Some(*u as f64),
            ValueVariant::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality across the two value categories: arrays compare element by
    /// element, scalars by value. An array never equals a scalar.
    pub fn same_value(&self, other: &ValueVariant) -> bool {
        match (self, other) {
            (ValueVariant::Array(a), ValueVariant::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (ValueVariant::Array(_), _) | (_, ValueVariant::Array(_)) => false,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ValueVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueVariant::Bool(b) => write!(f, "{}", b),
            ValueVariant::Int(i) => write!(f, "{}", i),
            ValueVariant::UInt(u) => write!(f, "{}", u),
            ValueVariant::Float(v) => write!(f, "{}", v),
            ValueVariant::String(s) => f.write_str(s),
            ValueVariant::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Declared type of a tag. Raw values are cast to it before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
    Array,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Short | DataType::Integer | DataType::Long | DataType::Float | DataType::Double
        )
    }
}

/// How numeric changes are compared against the value deadband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadbandType {
    #[default]
    None,
    Absolute,
    /// Absolute deadband, skipped whenever the value description changes.
    AbsoluteWithDescChange,
    /// Deadband size is a percentage of the current value.
    Relative,
    RelativeWithDescChange,
}

/// Static filtering configuration of a tag.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TagAddress {
    pub value_deadband_enabled: bool,
    pub value_deadband_type: DeadbandType,
    pub value_deadband_size: f32,
    pub time_deadband_enabled: bool,
    pub time_deadband_ms: u64,
}

impl TagAddress {
    pub fn with_value_deadband(mut self, kind: DeadbandType, size: f32) -> Self {
        self.value_deadband_enabled = kind != DeadbandType::None;
        self.value_deadband_type = kind;
        self.value_deadband_size = size;
        self
    }

    pub fn with_time_deadband(mut self, millis: u64) -> Self {
        self.time_deadband_enabled = millis > 0;
        self.time_deadband_ms = millis;
        self
    }
}

/// One accepted observation of a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRecord {
    pub value: Option<ValueVariant>,
    /// Empty string means "no description".
    pub value_description: String,
    pub quality: Quality,
    pub timestamp: i64, // Source timestamp, Unix milliseconds
}

impl ValueRecord {
    pub fn new(value: Option<ValueVariant>, value_description: &str, quality: Quality, timestamp: i64) -> Self {
        ValueRecord {
            value,
            value_description: value_description.to_string(),
            quality,
            timestamp,
        }
    }

    // Helper for a valid value stamped with the current time
    pub fn valid(value: ValueVariant) -> Self {
        Self::new(Some(value), "", Quality::ok(), now_millis())
    }
}

/// Metadata associated with a tag.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagMetadata {
    pub description: Option<String>,
    pub eng_unit: Option<String>,
}

/// Last accepted state of one monitored point.
#[derive(Debug, Clone, Serialize)]
pub struct TagSnapshot {
    pub id: TagId,
    pub name: String,
    pub data_type: DataType,
    /// `None` until the first update was accepted.
    pub current_value: Option<ValueRecord>,
    pub address: TagAddress,
    /// Equipment providing this tag's value.
    pub equipment_id: String,
    /// Protocol-specific address for this tag on the equipment.
    pub driver_address: String,
    pub metadata: TagMetadata,
}

impl TagSnapshot {
    pub fn new(id: TagId, name: impl Into<String>, data_type: DataType, address: TagAddress) -> Self {
        TagSnapshot {
            id,
            name: name.into(),
            data_type,
            current_value: None,
            address,
            equipment_id: String::new(),
            driver_address: String::new(),
            metadata: TagMetadata::default(),
        }
    }

    pub fn with_driver(mut self, equipment_id: impl Into<String>, driver_address: impl Into<String>) -> Self {
        self.equipment_id = equipment_id.into();
        self.driver_address = driver_address.into();
        self
    }

    /// Replaces the current value with `candidate`.
    ///
    /// Returns `None` without touching the state when both the current and the
    /// new record are valid and carry the same value and description: such an
    /// assignment changes nothing worth sending.
    pub fn update(&mut self, candidate: ValueRecord) -> Option<ValueRecord> {
        if let Some(current) = &self.current_value {
            let unchanged = candidate.quality.is_valid()
                && current.quality.is_valid()
                && current.value == candidate.value
                && current.value_description == candidate.value_description;
            if unchanged {
                return None;
            }
        }
        self.current_value = Some(candidate.clone());
        Some(candidate)
    }
}
