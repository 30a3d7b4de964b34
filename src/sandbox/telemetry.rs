/// Post-mortem process reports and their translation into case verdicts
use crate::result::{CaseResult, ResultFlags};
use nix::sys::signal::Signal;
use serde::Serialize;
use std::time::Duration;

/// What the sandbox observed about one finished process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessReport {
    pub exit_code: Option<i32>,
    /// Terminating signal number
    pub signal: Option<i32>,
    pub cpu_time: Duration,
    pub wall_time: Duration,
    /// Peak resident memory, in KiB
    pub max_memory: u64,
    pub cpu_limit_exceeded: bool,
    /// The wall clock watchdog killed the process
    pub wall_limit_exceeded: bool,
    pub memory_limit_exceeded: bool,
    pub output_limit_exceeded: bool,
    pub time_limit: Duration,
    /// KiB; zero means unlimited
    pub memory_limit: u64,
}

impl ProcessReport {
    pub fn is_tle(&self) -> bool {
        self.cpu_limit_exceeded
            || self.wall_limit_exceeded
            || self.signal == Some(Signal::SIGXCPU as i32)
    }

    pub fn is_mle(&self) -> bool {
        self.memory_limit_exceeded
    }

    pub fn is_ole(&self) -> bool {
        self.output_limit_exceeded || self.signal == Some(Signal::SIGXFSZ as i32)
    }

    /// Symbolic name of the terminating signal, if any.
    pub fn signal_name(&self) -> Option<String> {
        self.signal.map(|sig| match Signal::try_from(sig) {
            Ok(signal) => signal.as_str().to_string(),
            Err(_) => format!("signal {}", sig),
        })
    }

    /// Exited normally with status zero.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.signal.is_none()
    }
}

/// Exception class named on the last line of a traceback-style stderr.
fn exception_name(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let last = text.lines().rev().find(|line| !line.trim().is_empty())?;
    let name = last.split(':').next()?.trim();
    let short = name.rsplit('.').next()?;
    let is_identifier = !short.is_empty()
        && short.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if is_identifier && (short.ends_with("Error") || short.ends_with("Exception")) {
        Some(short.to_string())
    } else {
        None
    }
}

/// Copy telemetry and limit breaches from `report` into `result`.
pub fn populate_result(stderr: &[u8], result: &mut CaseResult, report: &ProcessReport) {
    result.execution_time = report.cpu_time.as_secs_f64();
    result.wall_time = report.wall_time.as_secs_f64();
    result.max_memory = report.max_memory;

    if report.is_tle() {
        result.flags |= ResultFlags::TLE;
    }
    if report.is_mle() {
        result.flags |= ResultFlags::MLE;
    }
    if report.is_ole() {
        result.flags |= ResultFlags::OLE;
    }
    if !result.flags.is_empty() {
        return;
    }

    if let Some(name) = report.signal_name() {
        result.flags |= ResultFlags::RTE;
        result.feedback = name;
    } else if report.exit_code.is_some_and(|code| code != 0) {
        result.flags |= ResultFlags::IR;
        if let Some(name) = exception_name(stderr) {
            result.feedback = name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::builtin::StandardChecker;
    use crate::problem::{CaseConfig, DataSource, TestCase};
    use std::sync::Arc;

    fn fresh_result() -> CaseResult {
        let case = TestCase::new(
            1,
            None,
            10.0,
            DataSource::Inline(Vec::new()),
            DataSource::Inline(Vec::new()),
            CaseConfig::default(),
            Arc::new(StandardChecker),
        );
        CaseResult::new(&case)
    }

    fn exited(code: i32) -> ProcessReport {
        ProcessReport {
            exit_code: Some(code),
            cpu_time: Duration::from_millis(120),
            wall_time: Duration::from_millis(150),
            max_memory: 2048,
            time_limit: Duration::from_secs(1),
            memory_limit: 65536,
            ..ProcessReport::default()
        }
    }

    #[test]
    fn test_clean_exit_sets_no_flags() {
        let mut result = fresh_result();
        populate_result(b"", &mut result, &exited(0));
        assert!(result.flags.is_empty());
        assert_eq!(result.max_memory, 2048);
        assert!((result.execution_time - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_nonzero_exit_is_invalid_return() {
        let mut result = fresh_result();
        let stderr = b"Traceback (most recent call last):\n  File \"x.py\"\nZeroDivisionError: division by zero\n";
        populate_result(stderr, &mut result, &exited(1));
        assert_eq!(result.flags, ResultFlags::IR);
        assert_eq!(result.feedback, "ZeroDivisionError");
    }

    #[test]
    fn test_signal_is_runtime_error() {
        let mut result = fresh_result();
        let report = ProcessReport {
            exit_code: None,
            signal: Some(Signal::SIGSEGV as i32),
            ..exited(0)
        };
        populate_result(b"", &mut result, &report);
        assert_eq!(result.flags, ResultFlags::RTE);
        assert_eq!(result.feedback, "SIGSEGV");
    }

    #[test]
    fn test_limit_signals_are_not_runtime_errors() {
        let mut result = fresh_result();
        let report = ProcessReport {
            exit_code: None,
            signal: Some(Signal::SIGXCPU as i32),
            ..exited(0)
        };
        populate_result(b"", &mut result, &report);
        assert_eq!(result.flags, ResultFlags::TLE);

        let mut result = fresh_result();
        let report = ProcessReport {
            exit_code: None,
            signal: Some(Signal::SIGXFSZ as i32),
            ..exited(0)
        };
        populate_result(b"", &mut result, &report);
        assert_eq!(result.flags, ResultFlags::OLE);
    }

    #[test]
    fn test_wall_watchdog_kill_is_tle() {
        let mut result = fresh_result();
        let report = ProcessReport {
            exit_code: None,
            signal: Some(Signal::SIGKILL as i32),
            wall_limit_exceeded: true,
            ..exited(0)
        };
        populate_result(b"", &mut result, &report);
        assert_eq!(result.flags, ResultFlags::TLE);
    }

    #[test]
    fn test_marked_output_with_clean_exit_is_ole() {
        let mut result = fresh_result();
        let report = ProcessReport {
            output_limit_exceeded: true,
            ..exited(0)
        };
        populate_result(b"", &mut result, &report);
        assert_eq!(result.flags, ResultFlags::OLE);
    }

    #[test]
    fn test_exception_name_parsing() {
        assert_eq!(exception_name(b"java.lang.ArithmeticException: / by zero\n").as_deref(), Some("ArithmeticException"));
        assert_eq!(exception_name(b"segfault here\n"), None);
        assert_eq!(exception_name(b""), None);
    }
}
