//! Problems and test cases.
//!
//! A problem owns its limits and optional interactive section; its test cases
//! are loaded separately and borrowed by a grader one at a time.

pub mod manifest;
pub mod test_case;

pub use manifest::load_problem;
pub use test_case::{CaseConfig, CaseInput, DataSource, LazyBytes, TestCase};

use crate::config::interactive::InteractiveConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Problem-level grading options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemConfig {
    #[serde(default)]
    pub interactive: Option<InteractiveConfig>,
    /// Ask language runtimes to disable output buffering
    #[serde(default = "default_unbuffered")]
    pub unbuffered: bool,
}

fn default_unbuffered() -> bool {
    true
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            interactive: None,
            unbuffered: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub id: String,
    /// CPU time limit per case
    pub time_limit: Duration,
    /// Memory limit per case, in KiB
    pub memory_limit: u64,
    /// Directory holding the manifest and its assets
    pub root: PathBuf,
    pub config: ProblemConfig,
}

impl Problem {
    pub fn new(id: impl Into<String>, time_limit: Duration, memory_limit: u64) -> Self {
        Self {
            id: id.into(),
            time_limit,
            memory_limit,
            root: PathBuf::from("."),
            config: ProblemConfig::default(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.config.interactive.is_some()
    }
}
