//! Sandboxed process execution.
//!
//! [`Sandbox`] launches a [`Binary`] under the limits of a [`LaunchSpec`] and
//! hands back a [`ProcessHandle`]. Limit breaches are reported as data in a
//! [`ProcessReport`], never as errors.

pub mod capture;
pub mod process;
pub mod telemetry;

pub use capture::{CapturedOutput, MemoryIO, OutputIntegrity};
pub use process::{LocalProcess, LocalSandbox};
pub use telemetry::ProcessReport;

use crate::config::types::{GraderError, Result};
use crate::executors::Binary;
use crate::result::CaseResult;
use std::collections::BTreeMap;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::time::Duration;

/// Ceiling on captured stderr. Stderr is diagnostic only.
pub const STDERR_LIMIT: usize = 1024 * 1024;

/// How one standard stream of a launched process is wired.
#[derive(Debug)]
pub enum StdioSpec {
    Null,
    /// Captured by the sandbox
    Piped,
    /// Bound to a descriptor the judge hands over; the judge's copy is closed on launch
    Fd(OwnedFd),
}

/// Extra filesystem access granted beyond the binary itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsRule {
    /// Read access to exactly this file
    ExactFile(PathBuf),
}

/// Everything the sandbox needs to start one process.
#[derive(Debug)]
pub struct LaunchSpec {
    /// Arguments appended to the binary's own argv
    pub args: Vec<String>,
    /// CPU time ceiling
    pub time: Duration,
    /// Wall clock ceiling; none means no watchdog
    pub wall_time: Option<Duration>,
    /// Memory ceiling in KiB, zero for unlimited
    pub memory: u64,
    pub stdin: StdioSpec,
    pub stdout: StdioSpec,
    pub stderr: StdioSpec,
    pub symlinks: BTreeMap<String, String>,
    pub extra_fs: Vec<FsRule>,
    /// Largest file the process may write, in bytes
    pub fsize: Option<u64>,
    pub workdir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(time: Duration, memory: u64) -> Self {
        Self {
            args: Vec::new(),
            time,
            wall_time: None,
            memory,
            stdin: StdioSpec::Null,
            stdout: StdioSpec::Null,
            stderr: StdioSpec::Piped,
            symlinks: BTreeMap::new(),
            extra_fs: Vec::new(),
            fsize: None,
            workdir: None,
            env: Vec::new(),
        }
    }
}

/// A launched sandboxed process.
pub trait ProcessHandle: Send {
    fn pid(&self) -> u32;

    /// Block until the process exits. Later calls return the same report.
    fn wait(&mut self) -> Result<ProcessReport>;

    /// Read piped stdout up to `outlimit` bytes and piped stderr up to
    /// `errlimit`.
    ///
    /// When stdout crosses `outlimit` reading stops immediately and the
    /// process is left running; the caller decides whether to kill it.
    /// Otherwise the process is waited for before returning.
    fn communicate(&mut self, outlimit: usize, errlimit: usize) -> Result<CapturedOutput>;

    /// Piped stderr, bounded by [`STDERR_LIMIT`]. Blocks until stderr closes.
    fn read_stderr(&mut self) -> Result<Vec<u8>>;

    fn kill(&mut self);

    /// Record an output limit breach detected by the judge.
    fn mark_ole(&mut self);

    /// Report of a waited-for process.
    fn report(&self) -> Option<&ProcessReport>;
}

/// Process launcher.
pub trait Sandbox: Send + Sync {
    fn launch(&self, binary: &Binary, spec: LaunchSpec) -> Result<Box<dyn ProcessHandle>>;

    /// Fill timing, memory and failure flags of `result` from a finished process.
    fn populate_result(
        &self,
        stderr: &[u8],
        result: &mut CaseResult,
        process: &dyn ProcessHandle,
    ) -> Result<()> {
        let report = process.report().ok_or_else(|| {
            GraderError::Internal(format!(
                "process {} has no report; it was never waited for",
                process.pid()
            ))
        })?;
        telemetry::populate_result(stderr, result, report);
        Ok(())
    }
}
