//! Output checkers.
//!
//! A checker judges the submission's captured output against the expected
//! output. Every field a checker may read is listed in [`CheckContext`]; a
//! checker returns a [`CheckerOutput`] which the grader normalizes exactly once
//! against the case's point value.

pub mod builtin;
pub mod registry;

pub use registry::CheckerRegistry;

use crate::config::types::CheckerError;
use crate::problem::{LazyBytes, TestCase};
use crate::result::CaseResult;
use serde::Serialize;

/// Everything a checker is allowed to look at.
pub struct CheckContext<'a> {
    pub submission_output: &'a [u8],
    pub judge_output: &'a [u8],
    pub submission_source: &'a [u8],
    /// Judge input, loaded only if the checker asks for it
    pub judge_input: &'a LazyBytes<'a>,
    pub point_value: f64,
    pub case_position: usize,
    pub batch: Option<u32>,
    pub submission_language: &'a str,
    /// Output is binary data and must not be decoded as text
    pub binary_data: bool,
    /// CPU seconds used by the submission
    pub execution_time: f64,
    pub problem_id: &'a str,
    pub case: &'a TestCase,
    pub result: &'a CaseResult,
}

/// Normalized checker judgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckerResult {
    pub passed: bool,
    pub points: f64,
    pub feedback: Option<String>,
    pub extended_feedback: Option<String>,
}

impl CheckerResult {
    pub fn new(passed: bool, points: f64) -> Self {
        Self {
            passed,
            points,
            feedback: None,
            extended_feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    pub fn with_extended_feedback(mut self, extended: impl Into<String>) -> Self {
        self.extended_feedback = Some(extended.into());
        self
    }
}

/// What a checker hands back before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckerOutput {
    /// Failed, zero points
    Fail,
    /// Passed, full points
    Pass,
    Graded(CheckerResult),
}

impl CheckerOutput {
    /// Collapse into a [`CheckerResult`] bounded by `max_points`.
    ///
    /// A failed judgement always carries zero points. A passed one is clipped
    /// to `[0, max_points]`, and a NaN award counts as zero.
    pub fn normalize(self, max_points: f64) -> CheckerResult {
        match self {
            CheckerOutput::Fail => CheckerResult::new(false, 0.0),
            CheckerOutput::Pass => CheckerResult::new(true, max_points),
            CheckerOutput::Graded(mut result) => {
                if !result.passed {
                    result.points = 0.0;
                } else if !(0.0..=max_points).contains(&result.points) {
                    log::warn!(
                        "Checker awarded {} points on a {} point case; clipping",
                        result.points,
                        max_points
                    );
                    result.points = if result.points.is_nan() {
                        0.0
                    } else {
                        result.points.clamp(0.0, max_points.max(0.0))
                    };
                }
                result
            }
        }
    }
}

impl From<bool> for CheckerOutput {
    fn from(passed: bool) -> Self {
        if passed {
            CheckerOutput::Pass
        } else {
            CheckerOutput::Fail
        }
    }
}

/// Correctness checker contract.
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError>;

    /// Whether the checker still runs when the submission already failed.
    fn run_on_error(&self) -> bool {
        false
    }
}
