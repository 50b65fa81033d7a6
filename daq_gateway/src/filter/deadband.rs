//! Numeric value deadband checks.
//!
//! Both checks answer "is the new value close enough to the current one to be
//! suppressed". A missing value on either side is never suppressed, and a
//! difference exactly equal to the tolerance is not inside the deadband.

use tracing::trace;

/// Converts a percentage into a factor.
const PERCENTAGE_FACTOR: f64 = 0.01;

/// True if both values are present and differ by less than `tolerance`.
pub fn is_absolute_deadband(current: Option<f64>, new: Option<f64>, tolerance: f32) -> bool {
    let filtered = match (current, new) {
        (Some(current), Some(new)) => (current - new).abs() < tolerance as f64,
        _ => false,
    };
    trace!("absolute deadband {:?} -> {:?} (tolerance {}): {}", current, new, tolerance, filtered);
    filtered
}

/// True if both values are present and differ by less than `percent` percent
/// of the current value. Equal values are always inside the deadband; a zero
/// current value never suppresses a change.
pub fn is_relative_deadband(current: Option<f64>, new: Option<f64>, percent: f32) -> bool {
    let filtered = match (current, new) {
        (Some(current), Some(new)) if current == new => true,
        (Some(current), Some(new)) if current != 0.0 => {
            let max_diff = current.abs() * percent as f64 * PERCENTAGE_FACTOR;
            (current - new).abs() < max_diff
        }
        _ => false,
    };
    trace!("relative deadband {:?} -> {:?} ({}%): {}", current, new, percent, filtered);
    filtered
}
