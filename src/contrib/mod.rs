//! Interactor protocol adapters.
//!
//! An adapter turns a finished interactor's exit status and stderr into a
//! judgement. Helper misbehavior (timeouts, crashes, unexpected codes) is a
//! judge-side fault and is raised as an internal error.

pub mod default;
pub mod testlib;

use crate::checkers::CheckerResult;
use crate::config::types::{GraderError, Result};
use crate::executors::Binary;
use crate::sandbox::ProcessReport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Interactor argument template used when a problem sets none.
pub const DEFAULT_ARGS_FORMAT: &str = "{input_file} {output_file} {answer_file}";

/// Everything an adapter may inspect about a finished interactor.
pub struct AdapterContext<'a> {
    pub report: &'a ProcessReport,
    pub binary: &'a Binary,
    pub max_points: f64,
    pub time_limit: Duration,
    /// KiB
    pub memory_limit: u64,
    /// Interactor stderr as feedback, present only when the problem shows it
    pub feedback: Option<String>,
    /// Helper name used in error messages
    pub name: &'a str,
    pub stderr: &'a [u8],
}

impl AdapterContext<'_> {
    /// Internal error describing why the helper did not produce a judgement.
    pub fn helper_error(&self) -> GraderError {
        let report = self.report;
        let message = if report.is_tle() {
            format!("{} timed out (> {} seconds)", self.name, self.time_limit.as_secs_f64())
        } else if report.is_mle() {
            format!("{} ran out of memory (> {} KB)", self.name, self.memory_limit)
        } else if let Some(signal) = report.signal_name() {
            format!("{} killed by {}", self.name, signal)
        } else {
            format!(
                "{} exited with nonzero code {}",
                self.name,
                report.exit_code.unwrap_or(-1)
            )
        };

        let stderr = String::from_utf8_lossy(self.stderr);
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            message
        } else {
            format!("{message} with stderr {stderr}")
        };
        log::error!("{}", message);
        GraderError::Internal(message)
    }

    pub fn passed(&self) -> CheckerResult {
        self.with_feedback(CheckerResult::new(true, self.max_points))
    }

    pub fn failed(&self) -> CheckerResult {
        self.with_feedback(CheckerResult::new(false, 0.0))
    }

    fn with_feedback(&self, result: CheckerResult) -> CheckerResult {
        match &self.feedback {
            Some(feedback) => result.with_feedback(feedback.clone()),
            None => result,
        }
    }
}

/// Translates an interactor's outcome into a judgement.
pub trait ProtocolAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn parse_return_code(&self, ctx: &AdapterContext<'_>) -> Result<CheckerResult>;

    fn interactor_args_format_string(&self) -> &str {
        DEFAULT_ARGS_FORMAT
    }
}

/// Adapters known to this judge, built once and injected into graders.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(default::DefaultAdapter));
        registry.register(Arc::new(testlib::TestlibAdapter::new()?));
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Look up an adapter; an unknown name is a judge configuration fault.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(name).cloned().ok_or_else(|| {
            log::error!("Unknown interactor protocol adapter {:?}", name);
            GraderError::Internal(format!("{name} is not a valid contrib module"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    fn context<'a>(report: &'a ProcessReport, binary: &'a Binary, stderr: &'a [u8]) -> AdapterContext<'a> {
        AdapterContext {
            report,
            binary,
            max_points: 10.0,
            time_limit: Duration::from_secs(3),
            memory_limit: 262144,
            feedback: None,
            name: "interactor",
            stderr,
        }
    }

    #[test]
    fn test_helper_error_messages() {
        let binary = Binary::new("cpp", vec!["/w/solution".to_string()]);

        let report = ProcessReport {
            wall_limit_exceeded: true,
            signal: Some(Signal::SIGKILL as i32),
            ..ProcessReport::default()
        };
        let err = context(&report, &binary, b"").helper_error();
        assert!(err.is_internal());
        assert_eq!(err.to_string(), "Internal error: interactor timed out (> 3 seconds)");

        let report = ProcessReport {
            memory_limit_exceeded: true,
            exit_code: Some(0),
            ..ProcessReport::default()
        };
        assert!(context(&report, &binary, b"").helper_error().to_string().contains("ran out of memory (> 262144 KB)"));

        let report = ProcessReport {
            signal: Some(Signal::SIGSEGV as i32),
            ..ProcessReport::default()
        };
        assert!(context(&report, &binary, b"").helper_error().to_string().contains("killed by SIGSEGV"));

        let report = ProcessReport {
            exit_code: Some(4),
            ..ProcessReport::default()
        };
        let message = context(&report, &binary, b"bad answer file\n").helper_error().to_string();
        assert!(message.contains("exited with nonzero code 4 with stderr bad answer file"));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AdapterRegistry::with_builtin().unwrap();
        assert_eq!(registry.get("default").map(|a| a.name().to_string()).ok(), Some("default".into()));
        assert_eq!(registry.get("testlib").map(|a| a.name().to_string()).ok(), Some("testlib".into()));

        let err = registry.get("coci").err().map(|e| (e.is_internal(), e.to_string()));
        assert_eq!(
            err,
            Some((true, "Internal error: coci is not a valid contrib module".to_string()))
        );
    }
}
