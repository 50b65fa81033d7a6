use crate::filter::deadband::{is_absolute_deadband, is_relative_deadband};
use crate::tags::structures::{quality_code, DeadbandType, Quality, TagSnapshot, ValueRecord, ValueVariant};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};

/// Result of checking a candidate update against the last accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOutcome {
    /// The candidate carries new information and must be sent.
    NoFiltering,
    /// Source timestamp is older than the accepted one.
    OldUpdate,
    /// Same valid value, description and quality as before.
    RepeatedValue,
    /// Same invalidation (code and description) as before.
    RepeatedInvalid,
    /// Numeric change within the configured value deadband.
    ValueDeadband,
}

impl FilterOutcome {
    /// Numeric code reported with filtered values to the statistics channel.
    pub fn code(self) -> i16 {
        match self {
            FilterOutcome::NoFiltering => 0,
            FilterOutcome::RepeatedValue => 1,
            FilterOutcome::ValueDeadband => 2,
            FilterOutcome::OldUpdate => 3,
            FilterOutcome::RepeatedInvalid => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterOutcome::NoFiltering => "NO_FILTERING",
            FilterOutcome::OldUpdate => "OLD_UPDATE",
            FilterOutcome::RepeatedValue => "REPEATED_VALUE",
            FilterOutcome::RepeatedInvalid => "REPEATED_INVALID",
            FilterOutcome::ValueDeadband => "VALUE_DEADBAND",
        }
    }

    pub fn is_filtered(self) -> bool {
        self != FilterOutcome::NoFiltering
    }
}

impl fmt::Display for FilterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming update not yet accepted or rejected.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub value: Option<&'a ValueVariant>,
    pub value_description: Option<&'a str>,
    pub quality: &'a Quality,
    pub timestamp: i64,
}

impl Candidate<'_> {
    fn description(&self) -> &str {
        self.value_description.unwrap_or("")
    }
}

/// One step of the repeated-value check. `None` hands over to the next rule.
type Rule = fn(&TagSnapshot, &ValueRecord, &Candidate<'_>) -> Option<FilterOutcome>;

/// Evaluated in order; the first definitive answer wins.
const REPEATED_VALUE_RULES: [Rule; 3] = [compare_values, compare_descriptions, compare_qualities];

/// Decides whether a candidate update for `tag` has to be sent or filtered out.
/// Pure: the tag is only read.
pub fn classify(
    tag: &TagSnapshot,
    new_value: Option<&ValueVariant>,
    new_value_desc: Option<&str>,
    new_quality: &Quality,
    new_timestamp: i64,
) -> FilterOutcome {
    let candidate = Candidate {
        value: new_value,
        value_description: new_value_desc,
        quality: new_quality,
        timestamp: new_timestamp,
    };
    classify_candidate(tag, &candidate)
}

pub fn classify_candidate(tag: &TagSnapshot, candidate: &Candidate<'_>) -> FilterOutcome {
    let Some(current) = tag.current_value.as_ref() else {
        trace!("Tag #{} has no value yet, not filtering", tag.id);
        return FilterOutcome::NoFiltering;
    };

    let outcome = if is_older_update(candidate.quality, &current.quality, candidate.timestamp, current.timestamp) {
        match is_repeated_value(tag, current, candidate) {
            repeated @ (FilterOutcome::RepeatedInvalid | FilterOutcome::RepeatedValue) => repeated,
            _ => {
                trace!(
                    "Tag #{}: timestamp {} is older than current {}",
                    tag.id,
                    candidate.timestamp,
                    current.timestamp
                );
                FilterOutcome::OldUpdate
            }
        }
    } else {
        is_repeated_value(tag, current, candidate)
    };

    debug!("Tag #{} classified as {}", tag.id, outcome);
    outcome
}

/// An update with an older source timestamp is stale, except when it brings a
/// valid value to a tag that is currently flagged as unavailable.
pub fn is_older_update(new_quality: &Quality, current_quality: &Quality, new_timestamp: i64, current_timestamp: i64) -> bool {
    if new_timestamp >= current_timestamp {
        return false;
    }
    if current_quality.code == quality_code::DATA_UNAVAILABLE {
        return !new_quality.is_valid();
    }
    true
}

fn is_repeated_value(tag: &TagSnapshot, current: &ValueRecord, candidate: &Candidate<'_>) -> FilterOutcome {
    REPEATED_VALUE_RULES
        .iter()
        .find_map(|rule| rule(tag, current, candidate))
        .unwrap_or(FilterOutcome::NoFiltering)
}

fn compare_values(tag: &TagSnapshot, current: &ValueRecord, candidate: &Candidate<'_>) -> Option<FilterOutcome> {
    match (current.value.as_ref(), candidate.value) {
        (None, Some(_)) => {
            trace!("Tag #{}: new value initializes the tag", tag.id);
            Some(FilterOutcome::NoFiltering)
        }
        (Some(old), new) if !new.is_some_and(|new| old.same_value(new)) => {
            if is_value_deadband_filtered(tag, current, candidate) {
                trace!("Tag #{}: change {} -> {:?} within value deadband", tag.id, old, new);
                Some(FilterOutcome::ValueDeadband)
            } else {
                trace!("Tag #{}: value changed {} -> {:?}", tag.id, old, new);
                Some(FilterOutcome::NoFiltering)
            }
        }
        _ => None,
    }
}

fn compare_descriptions(tag: &TagSnapshot, current: &ValueRecord, candidate: &Candidate<'_>) -> Option<FilterOutcome> {
    if eq_ignore_case(&current.value_description, candidate.description()) {
        return None;
    }
    trace!("Tag #{}: value description changed", tag.id);
    Some(FilterOutcome::NoFiltering)
}

fn compare_qualities(tag: &TagSnapshot, current: &ValueRecord, candidate: &Candidate<'_>) -> Option<FilterOutcome> {
    if current.quality.code != candidate.quality.code {
        trace!("Tag #{}: quality code changed", tag.id);
        return Some(FilterOutcome::NoFiltering);
    }
    if candidate.quality.is_valid() {
        return Some(FilterOutcome::RepeatedValue);
    }
    if current.quality.description == candidate.quality.description {
        Some(FilterOutcome::RepeatedInvalid)
    } else {
        trace!("Tag #{}: quality description changed", tag.id);
        Some(FilterOutcome::NoFiltering)
    }
}

/// Numeric deadband applies only to numeric tags whose quality code is unchanged.
fn is_value_deadband_filtered(tag: &TagSnapshot, current: &ValueRecord, candidate: &Candidate<'_>) -> bool {
    let address = &tag.address;
    if !address.value_deadband_enabled
        || !tag.data_type.is_numeric()
        || current.quality.code != candidate.quality.code
    {
        return false;
    }

    let old = current.value.as_ref().and_then(ValueVariant::as_f64);
    let new = candidate.value.and_then(ValueVariant::as_f64);
    let size = address.value_deadband_size;
    let description_unchanged = current.value_description == candidate.description();

    match address.value_deadband_type {
        DeadbandType::None => false,
        DeadbandType::Absolute => is_absolute_deadband(old, new, size),
        DeadbandType::AbsoluteWithDescChange => description_unchanged && is_absolute_deadband(old, new, size),
        DeadbandType::Relative => is_relative_deadband(old, new, size),
        DeadbandType::RelativeWithDescChange => description_unchanged && is_relative_deadband(old, new, size),
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
