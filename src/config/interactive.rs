/// Interactive problem configuration
use crate::config::seconds;
use crate::config::types::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowance added on top of the problem time limit when none is configured.
pub const DEFAULT_PREPROCESSING_TIME: Duration = Duration::from_secs(2);

/// Interactor source list, accepted either as a single file or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourceFiles {
    One(String),
    Many(Vec<String>),
}

impl SourceFiles {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            SourceFiles::One(file) => vec![file.clone()],
            SourceFiles::Many(files) => files.clone(),
        }
    }
}

/// Problem-supplied interactor settings. Immutable for the lifetime of a grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveConfig {
    /// Interactor sources, relative to the problem root
    pub files: SourceFiles,
    /// Language the interactor is written in
    pub lang: String,
    #[serde(default)]
    pub flags: Vec<String>,
    /// Compile time limit in seconds
    #[serde(default)]
    pub compiler_time_limit: Option<f64>,
    #[serde(default = "default_unbuffered")]
    pub unbuffered: bool,
    /// Extra seconds granted to the interactor beyond the problem time limit
    #[serde(default)]
    pub preprocessing_time: Option<f64>,
    /// Interactor memory ceiling in KiB
    #[serde(default)]
    pub memory_limit: Option<u64>,
    /// Argument template with `{input_file}`, `{output_file}` and `{answer_file}`
    #[serde(default)]
    pub args_format_string: Option<String>,
    /// Show interactor stderr to the contestant
    #[serde(default)]
    pub feedback: bool,
    /// Protocol adapter name
    #[serde(rename = "type", default = "default_adapter")]
    pub adapter: String,
}

fn default_unbuffered() -> bool {
    true
}

fn default_adapter() -> String {
    "default".to_string()
}

impl InteractiveConfig {
    /// Allowance added to the problem time limit. Unset or zero means the default.
    pub fn preprocessing_time(&self) -> Result<Duration> {
        match self.preprocessing_time {
            Some(secs) if secs > 0.0 => seconds(secs, "preprocessing_time"),
            _ => Ok(DEFAULT_PREPROCESSING_TIME),
        }
    }
}
