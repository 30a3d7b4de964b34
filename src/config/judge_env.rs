/// Judge-wide defaults loaded from a JSON file
use crate::config::types::{GraderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Judge environment shared by every grader on this host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeEnv {
    /// Memory ceiling (KiB) for judge-side helpers such as interactors
    pub generator_memory_limit: u64,
    /// Compile time limit (seconds) when a problem does not set one
    pub compiler_time_limit: f64,
    /// Memory ceiling (KiB) for compilers
    pub compiler_memory_limit: u64,
    /// Capture submission output through a memory-backed file instead of pipes
    pub memfd_output: bool,
    /// Directories searched for problem manifests
    pub problem_roots: Vec<PathBuf>,
}

impl Default for JudgeEnv {
    fn default() -> Self {
        Self {
            generator_memory_limit: 262_144,
            compiler_time_limit: 10.0,
            compiler_memory_limit: 2 * 1024 * 1024,
            memfd_output: true,
            problem_roots: Vec::new(),
        }
    }
}

impl JudgeEnv {
    /// Load the judge environment from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraderError::Config(format!(
                "Failed to read judge environment {}: {}",
                path.display(),
                e
            ))
        })?;

        let env: JudgeEnv = serde_json::from_str(&content).map_err(|e| {
            GraderError::Config(format!("Failed to parse judge environment JSON: {}", e))
        })?;

        log::info!(
            "Loaded judge environment from {} ({} problem roots)",
            path.display(),
            env.problem_roots.len()
        );
        Ok(env)
    }

    pub fn compiler_time_limit(&self) -> Result<Duration> {
        crate::config::seconds(self.compiler_time_limit.max(0.0), "compiler_time_limit")
    }

    /// Locate a problem directory by id under the configured roots.
    pub fn problem_root(&self, problem_id: &str) -> Option<PathBuf> {
        self.problem_roots
            .iter()
            .map(|root| root.join(problem_id))
            .find(|dir| dir.join(crate::problem::manifest::MANIFEST_FILE).is_file())
    }
}
