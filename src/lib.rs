//! gradebox: grading orchestration for competitive-programming submissions
//!
//! Runs a compiled submission against a problem's test cases, either alone or
//! cross-wired with a judge-supplied interactor, and turns process telemetry
//! and checker judgements into per-case results.
//!
//! # Architecture
//!
//! ## Grading ([`grader`])
//! - [`grader::standard`]: Single-process grading with bounded output capture
//! - [`grader::interactive`]: Submission and interactor joined by crossed pipes
//! - [`grader::pipes`]: Ownership of the four crossed pipe ends
//!
//! ## Judgement ([`checkers`], [`contrib`], [`result`])
//! - [`checkers`]: Checker contract, judgement normalization, built-in checkers
//! - [`contrib`]: Protocol adapters turning an interactor's exit into a judgement
//! - [`result`]: Per-case result record and verdict flags
//!
//! ## Execution ([`sandbox`], [`executors`])
//! - [`sandbox::process`]: rlimit-bounded local processes with a wall watchdog
//! - [`sandbox::capture`]: Bounded stream reading and memory-backed stdout
//! - [`sandbox::telemetry`]: Process reports and result population
//! - [`executors`]: Language adapters and the sandboxed compiler
//!
//! ## Problem data ([`problem`], [`config`])
//! - [`problem::test_case`]: Lazily loaded, releasable case data
//! - [`problem::manifest`]: `problem.json` loading
//! - [`config`]: Error taxonomy, judge environment, interactive settings
//!
//! # Principles
//!
//! 1. **Breaches are data** - Limit violations land in the result, never in `Err`
//! 2. **Judge faults are errors** - Interactor and checker failures abort the case
//! 3. **Release on every path** - Case data is freed whether grading succeeds or not

// Grading
pub mod grader;

// Judgement
pub mod checkers;
pub mod contrib;
pub mod result;

// Execution
pub mod executors;
pub mod sandbox;

// Problem data & configuration
pub mod config;
pub mod problem;

// CLI entrypoint wiring for the gradebox binary.
pub mod cli;

pub use config::types::{CheckerError, CompileError, GraderError, Result};
