use crate::error::CastError;
use crate::tags::structures::{DataType, ValueVariant};

/// Converts a raw equipment value to the declared type of a tag.
pub fn cast(value: &ValueVariant, target: DataType) -> Result<ValueVariant, CastError> {
    match target {
        DataType::Boolean => to_bool(value).map(ValueVariant::Bool),
        DataType::Short => to_integer(value, i16::MIN as i64, i16::MAX as i64, target).map(ValueVariant::Int),
        DataType::Integer => to_integer(value, i32::MIN as i64, i32::MAX as i64, target).map(ValueVariant::Int),
        DataType::Long => to_integer(value, i64::MIN, i64::MAX, target).map(ValueVariant::Int),
        DataType::Float => {
            let v = to_float(value, target)?;
            if v.is_finite() && v.abs() > f32::MAX as f64 {
                return Err(out_of_range(value, target));
            }
            Ok(ValueVariant::Float(v as f32 as f64))
        }
        DataType::Double => to_float(value, target).map(ValueVariant::Float),
        DataType::String => match value {
            ValueVariant::Array(_) => Err(unsupported(value, target)),
            other => Ok(ValueVariant::String(other.to_string())),
        },
        DataType::Array => match value {
            ValueVariant::Array(items) => Ok(ValueVariant::Array(items.clone())),
            other => Err(unsupported(other, target)),
        },
    }
}

fn to_bool(value: &ValueVariant) -> Result<bool, CastError> {
    match value {
        ValueVariant::Bool(b) => Ok(*b),
        ValueVariant::Int(i) => Ok(*i != 0),
        ValueVariant::UInt(u) => Ok(*u != 0),
        ValueVariant::Float(f) => Ok(*f != 0.0),
        ValueVariant::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(CastError::Parse {
                input: s.clone(),
                target: DataType::Boolean,
            }),
        },
        ValueVariant::Array(_) => Err(unsupported(value, DataType::Boolean)),
    }
}

fn to_integer(value: &ValueVariant, min: i64, max: i64, target: DataType) -> Result<i64, CastError> {
    let candidate = match value {
        ValueVariant::Bool(b) => *b as i64,
        ValueVariant::Int(i) => *i,
        ValueVariant::UInt(u) => i64::try_from(*u).map_err(|_| out_of_range(value, target))?,
        ValueVariant::Float(f) => float_to_integer(*f, value, target)?,
        ValueVariant::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(i) => i,
                Err(_) => {
                    let f = trimmed.parse::<f64>().map_err(|_| CastError::Parse {
                        input: s.clone(),
                        target,
                    })?;
                    float_to_integer(f, value, target)?
                }
            }
        }
        ValueVariant::Array(_) => return Err(unsupported(value, target)),
    };
    if candidate < min || candidate > max {
        return Err(out_of_range(value, target));
    }
    Ok(candidate)
}

// Truncates towards zero. i64::MAX as f64 rounds up to 2^63, which does not fit
fn float_to_integer(f: f64, value: &ValueVariant, target: DataType) -> Result<i64, CastError> {
    let truncated = f.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(out_of_range(value, target));
    }
    Ok(truncated as i64)
}

fn to_float(value: &ValueVariant, target: DataType) -> Result<f64, CastError> {
    match value {
        ValueVariant::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        ValueVariant::Int(i) => Ok(*i as f64),
        ValueVariant::UInt(u) => Ok(*u as f64),
        ValueVariant::Float(f) => Ok(*f),
        ValueVariant::String(s) => s.trim().parse::<f64>().map_err(|_| CastError::Parse {
            input: s.clone(),
            target,
        }),
        ValueVariant::Array(_) => Err(unsupported(value, target)),
    }
}

fn unsupported(value: &ValueVariant, target: DataType) -> CastError {
    CastError::Unsupported {
        value: value.to_string(),
        target,
    }
}

fn out_of_range(value: &ValueVariant, target: DataType) -> CastError {
    CastError::OutOfRange {
        value: value.to_string(),
        target,
    }
}
