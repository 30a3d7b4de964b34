/// `problem.json` loader
use crate::checkers::CheckerRegistry;
use crate::config::interactive::InteractiveConfig;
use crate::config::types::{GraderError, Result};
use crate::problem::{CaseConfig, DataSource, Problem, ProblemConfig, TestCase};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

pub const MANIFEST_FILE: &str = "problem.json";

#[derive(Debug, Deserialize)]
struct Manifest {
    id: String,
    /// Seconds
    time_limit: f64,
    /// KiB
    memory_limit: u64,
    #[serde(default = "default_checker")]
    checker: String,
    #[serde(default = "default_unbuffered")]
    unbuffered: bool,
    #[serde(default)]
    interactive: Option<InteractiveConfig>,
    /// Case config applied to every case before its own overrides
    #[serde(default)]
    case_defaults: Map<String, Value>,
    cases: Vec<CaseEntry>,
}

#[derive(Debug, Deserialize)]
struct CaseEntry {
    input: String,
    #[serde(default)]
    output: Option<String>,
    points: f64,
    #[serde(default)]
    batch: Option<u32>,
    #[serde(default)]
    checker: Option<String>,
    #[serde(default)]
    config: Map<String, Value>,
}

fn default_checker() -> String {
    "standard".to_string()
}

fn default_unbuffered() -> bool {
    true
}

/// Overlay `overrides` on top of `base`, key by key.
fn merge_case_config(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Result<CaseConfig> {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(merged))
        .map_err(|e| GraderError::Config(format!("Invalid case config: {}", e)))
}

/// Load a problem and its cases from `dir/problem.json`.
pub fn load_problem(dir: &Path, checkers: &CheckerRegistry) -> Result<(Problem, Vec<TestCase>)> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
        GraderError::Config(format!(
            "Failed to read manifest {}: {}",
            manifest_path.display(),
            e
        ))
    })?;
    let manifest: Manifest = serde_json::from_str(&content)
        .map_err(|e| GraderError::Config(format!("Failed to parse manifest JSON: {}", e)))?;

    if !(manifest.time_limit.is_finite() && manifest.time_limit > 0.0) {
        return Err(GraderError::Config(format!(
            "time_limit must be positive, got {}",
            manifest.time_limit
        )));
    }

    let problem = Problem {
        id: manifest.id,
        time_limit: crate::config::seconds(manifest.time_limit, "time_limit")?,
        memory_limit: manifest.memory_limit,
        root: dir.to_path_buf(),
        config: ProblemConfig {
            interactive: manifest.interactive,
            unbuffered: manifest.unbuffered,
        },
    };

    let mut cases = Vec::with_capacity(manifest.cases.len());
    for (idx, entry) in manifest.cases.into_iter().enumerate() {
        let checker_name = entry.checker.as_deref().unwrap_or(&manifest.checker);
        let checker = checkers.get(checker_name)?;
        let config = merge_case_config(&manifest.case_defaults, &entry.config)?;
        let output = match entry.output {
            Some(name) => DataSource::File(dir.join(name)),
            None => DataSource::Inline(Vec::new()),
        };
        cases.push(TestCase::new(
            idx + 1,
            entry.batch,
            entry.points,
            DataSource::File(dir.join(&entry.input)),
            output,
            config,
            checker,
        ));
    }

    log::info!(
        "Loaded problem {} with {} cases{}",
        problem.id,
        cases.len(),
        if problem.is_interactive() { " (interactive)" } else { "" }
    );
    Ok((problem, cases))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_manifest(dir: &Path, body: &str) {
        std::fs::write(dir.join(MANIFEST_FILE), body).unwrap();
    }

    #[test]
    fn test_load_standard_problem() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{
                "id": "aplusb",
                "time_limit": 1.5,
                "memory_limit": 65536,
                "case_defaults": {"output_limit_length": 1024},
                "cases": [
                    {"input": "1.in", "output": "1.out", "points": 10},
                    {"input": "2.in", "output": "2.out", "points": 20, "batch": 1,
                     "checker": "identical", "config": {"wall_time_factor": 2.0}}
                ]
            }"#,
        );

        let (problem, cases) = load_problem(dir.path(), &CheckerRegistry::with_builtin()).unwrap();
        assert_eq!(problem.id, "aplusb");
        assert_eq!(problem.time_limit, Duration::from_millis(1500));
        assert!(!problem.is_interactive());
        assert_eq!(cases.len(), 2);

        assert_eq!(cases[0].position(), 1);
        assert_eq!(cases[0].checker().name(), "standard");
        assert_eq!(cases[0].config().output_limit_length, 1024);
        assert_eq!(cases[0].config().wall_time_factor, 3.0);

        assert_eq!(cases[1].batch(), Some(1));
        assert_eq!(cases[1].checker().name(), "identical");
        assert_eq!(cases[1].config().output_limit_length, 1024);
        assert_eq!(cases[1].config().wall_time_factor, 2.0);
    }

    #[test]
    fn test_load_interactive_problem() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{
                "id": "guess",
                "time_limit": 2,
                "memory_limit": 262144,
                "interactive": {"files": "interactor.cpp", "lang": "cpp", "type": "testlib"},
                "cases": [{"input": "1.in", "points": 100}]
            }"#,
        );

        let (problem, cases) = load_problem(dir.path(), &CheckerRegistry::with_builtin()).unwrap();
        assert!(problem.is_interactive());
        assert_eq!(
            problem.config.interactive.as_ref().map(|i| i.adapter.as_str()),
            Some("testlib")
        );
        assert_eq!(&*cases[0].output_data().unwrap(), b"");
    }

    #[test]
    fn test_unknown_checker_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"id": "x", "time_limit": 1, "memory_limit": 1024, "checker": "nope",
                "cases": [{"input": "1.in", "points": 1}]}"#,
        );
        let err = load_problem(dir.path(), &CheckerRegistry::with_builtin()).unwrap_err();
        assert!(matches!(err, GraderError::Config(_)));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_problem(dir.path(), &CheckerRegistry::with_builtin()).unwrap_err();
        assert!(err.to_string().contains("problem.json"));
    }
}
