//! Configuration
//!
//! Error taxonomy, judge-wide defaults and interactive problem settings.

pub mod interactive;
pub mod judge_env;
pub mod types;

use std::time::Duration;
use types::{GraderError, Result};

/// A configured number of seconds as a `Duration`.
///
/// Negative, non-finite and overflowing values are configuration errors.
pub fn seconds(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| GraderError::Config(format!("{field} of {value} seconds is out of range")))
}
