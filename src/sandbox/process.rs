/// Local rlimit-based process backend
///
/// Each process runs in its own session with CPU, address-space, file-size and
/// core-dump rlimits applied before exec. A watchdog thread enforces the wall
/// clock ceiling by killing the whole process group.
use crate::config::types::{GraderError, Result};
use crate::executors::Binary;
use crate::sandbox::capture::{read_bounded, CapturedOutput, CapturedStream, OutputIntegrity, Overflow};
use crate::sandbox::{LaunchSpec, ProcessHandle, ProcessReport, Sandbox, StdioSpec, STDERR_LIMIT};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::{ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Sandbox backed by plain child processes and rlimits.
///
/// It cannot restrict filesystem access: symlink maps and extra filesystem
/// rules are logged and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct LocalSandbox;

impl Sandbox for LocalSandbox {
    fn launch(&self, binary: &Binary, spec: LaunchSpec) -> Result<Box<dyn ProcessHandle>> {
        Ok(Box::new(LocalProcess::spawn(binary, spec)?))
    }
}

/// Limits applied in the child between fork and exec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RlimitPlan {
    cpu_seconds: u64,
    address_space: Option<u64>,
    fsize: Option<u64>,
}

impl RlimitPlan {
    fn new(binary: &Binary, spec: &LaunchSpec) -> Self {
        let address_space = (spec.memory > 0 && binary.limits_address_space())
            .then(|| spec.memory.saturating_mul(1024));
        Self {
            // Soft limit one second past the ceiling so usage is measured, not truncated.
            cpu_seconds: (spec.time.as_secs_f64().ceil() as u64).saturating_add(1),
            address_space,
            fsize: spec.fsize,
        }
    }

    /// Runs in the forked child. Only async-signal-safe calls.
    fn apply(&self) -> std::io::Result<()> {
        if unsafe { libc::setsid() } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        set_rlimit(libc::RLIMIT_CPU, self.cpu_seconds, self.cpu_seconds.saturating_add(1))?;
        if let Some(bytes) = self.address_space {
            set_rlimit(libc::RLIMIT_AS, bytes, bytes)?;
        }
        if let Some(bytes) = self.fsize {
            set_rlimit(libc::RLIMIT_FSIZE, bytes, bytes)?;
        }
        set_rlimit(libc::RLIMIT_CORE, 0, 0)
    }
}

fn set_rlimit(resource: libc::__rlimit_resource_t, soft: u64, hard: u64) -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    };
    let rc = unsafe { libc::setrlimit(resource, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn into_stdio(spec: StdioSpec) -> Stdio {
    match spec {
        StdioSpec::Null => Stdio::null(),
        StdioSpec::Piped => Stdio::piped(),
        StdioSpec::Fd(fd) => Stdio::from(fd),
    }
}

/// Shared between the process handle and its watchdog.
#[derive(Debug, Default)]
struct ReapState {
    /// The process has exited and may be reaped; its pid must not be signalled
    exited: bool,
    wall_killed: bool,
}

fn lock(state: &Mutex<ReapState>) -> MutexGuard<'_, ReapState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn spawn_watchdog(
    pid: Pid,
    limit: Duration,
    state: Arc<Mutex<ReapState>>,
) -> (Sender<()>, JoinHandle<()>) {
    let (stop, stopped) = bounded::<()>(1);
    let handle = thread::spawn(move || {
        if let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(limit) {
            let mut state = lock(&state);
            if !state.exited {
                log::debug!("Wall clock limit {:?} reached; killing process group {}", limit, pid);
                if let Err(e) = killpg(pid, Signal::SIGKILL) {
                    log::debug!("killpg({}) from watchdog failed: {}", pid, e);
                }
                state.wall_killed = true;
            }
        }
    });
    (stop, handle)
}

fn timeval_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

fn reap(pid: Pid) -> Result<(libc::c_int, libc::rusage)> {
    let mut status: libc::c_int = 0;
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        let rc = unsafe { libc::wait4(pid.as_raw(), &mut status, 0, &mut usage) };
        if rc == pid.as_raw() {
            return Ok((status, usage));
        }
        match Errno::last() {
            Errno::EINTR => continue,
            err => {
                return Err(GraderError::Process(format!("wait4({}) failed: {}", pid, err)));
            }
        }
    }
}

/// A child process launched by [`LocalSandbox`].
pub struct LocalProcess {
    pid: Pid,
    started: Instant,
    stdout: Option<ChildStdout>,
    stderr_reader: Option<JoinHandle<CapturedStream>>,
    stderr: Option<CapturedStream>,
    state: Arc<Mutex<ReapState>>,
    watchdog: Option<(Sender<()>, JoinHandle<()>)>,
    time_limit: Duration,
    memory_limit: u64,
    ole: bool,
    report: Option<ProcessReport>,
}

impl LocalProcess {
    pub fn spawn(binary: &Binary, spec: LaunchSpec) -> Result<Self> {
        let (program, base_args) = binary.argv().split_first().ok_or_else(|| {
            GraderError::Config(format!("{} binary has an empty command", binary.language()))
        })?;

        let mut cmd = Command::new(program);
        cmd.args(base_args).args(&spec.args);
        cmd.env_clear().env("PATH", DEFAULT_PATH);
        for (key, value) in binary.env().iter().chain(spec.env.iter()) {
            cmd.env(key, value);
        }
        if let Some(dir) = spec.workdir.as_deref().or(binary.workdir()) {
            cmd.current_dir(dir);
        }
        if !spec.symlinks.is_empty() || !spec.extra_fs.is_empty() {
            log::warn!(
                "Local sandbox cannot enforce filesystem policy; ignoring {} symlinks and {} access rules",
                spec.symlinks.len(),
                spec.extra_fs.len()
            );
        }

        let plan = RlimitPlan::new(binary, &spec);
        let stdout_piped = matches!(spec.stdout, StdioSpec::Piped);
        cmd.stdin(into_stdio(spec.stdin))
            .stdout(into_stdio(spec.stdout))
            .stderr(into_stdio(spec.stderr));
        unsafe {
            cmd.pre_exec(move || plan.apply());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| GraderError::Process(format!("Failed to start {}: {}", program, e)))?;
        // Closes the judge's copies of any descriptors handed to the child.
        drop(cmd);

        let started = Instant::now();
        let pid = Pid::from_raw(child.id() as i32);
        drop(child.stdin.take());
        let stdout = if stdout_piped { child.stdout.take() } else { None };
        let stderr_reader = child
            .stderr
            .take()
            .map(|pipe| thread::spawn(move || read_bounded(pipe, STDERR_LIMIT, Overflow::Discard)));

        let state = Arc::new(Mutex::new(ReapState::default()));
        let watchdog = spec
            .wall_time
            .map(|limit| spawn_watchdog(pid, limit, Arc::clone(&state)));

        log::debug!(
            "Launched {} as pid {} (cpu {:?}, wall {:?}, memory {} KiB)",
            program,
            pid,
            spec.time,
            spec.wall_time,
            spec.memory
        );

        Ok(Self {
            pid,
            started,
            stdout,
            stderr_reader,
            stderr: None,
            state,
            watchdog,
            time_limit: spec.time,
            memory_limit: spec.memory,
            ole: false,
            report: None,
        })
    }

    fn stderr_stream(&mut self) -> Result<&CapturedStream> {
        if let Some(reader) = self.stderr_reader.take() {
            let captured = reader
                .join()
                .map_err(|_| GraderError::Internal("stderr reader thread panicked".to_string()))?;
            self.stderr = Some(captured);
        }
        Ok(self.stderr.get_or_insert_with(|| CapturedStream {
            data: Vec::new(),
            integrity: OutputIntegrity::Complete,
        }))
    }

    fn build_report(&self, status: libc::c_int, usage: &libc::rusage, wall_time: Duration, wall_killed: bool) -> ProcessReport {
        let (exit_code, signal) = if libc::WIFEXITED(status) {
            (Some(libc::WEXITSTATUS(status)), None)
        } else if libc::WIFSIGNALED(status) {
            (None, Some(libc::WTERMSIG(status)))
        } else {
            (None, None)
        };
        let cpu_time = timeval_duration(usage.ru_utime) + timeval_duration(usage.ru_stime);
        // ru_maxrss is in KiB on Linux.
        let max_memory = usage.ru_maxrss.max(0) as u64;

        ProcessReport {
            exit_code,
            signal,
            cpu_time,
            wall_time,
            max_memory,
            cpu_limit_exceeded: cpu_time > self.time_limit,
            wall_limit_exceeded: wall_killed,
            memory_limit_exceeded: self.memory_limit > 0 && max_memory > self.memory_limit,
            output_limit_exceeded: self.ole,
            time_limit: self.time_limit,
            memory_limit: self.memory_limit,
        }
    }
}

impl ProcessHandle for LocalProcess {
    fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    fn wait(&mut self) -> Result<ProcessReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }

        // Block on exit without reaping so the pid stays ours while the
        // watchdog is stopped.
        loop {
            match waitid(Id::Pid(self.pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    return Err(GraderError::Process(format!("waitid({}) failed: {}", self.pid, e)));
                }
            }
        }
        let wall_time = self.started.elapsed();

        let wall_killed = {
            let mut state = lock(&self.state);
            state.exited = true;
            state.wall_killed
        };
        if let Some((stop, handle)) = self.watchdog.take() {
            drop(stop);
            let _ = handle.join();
        }

        // Leftover group members would otherwise hold our pipes open.
        match killpg(self.pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) | Err(Errno::EPERM) => {}
            Err(e) => log::debug!("killpg({}) after exit failed: {}", self.pid, e),
        }

        let (status, usage) = reap(self.pid)?;
        let report = self.build_report(status, &usage, wall_time, wall_killed);
        log::debug!(
            "Process {} finished: exit {:?}, signal {:?}, cpu {:?}, wall {:?}, {} KiB",
            self.pid,
            report.exit_code,
            report.signal,
            report.cpu_time,
            report.wall_time,
            report.max_memory
        );
        self.report = Some(report.clone());
        Ok(report)
    }

    fn communicate(&mut self, outlimit: usize, errlimit: usize) -> Result<CapturedOutput> {
        let stdout = match self.stdout.take() {
            Some(pipe) => read_bounded(pipe, outlimit, Overflow::Stop),
            None => CapturedStream {
                data: Vec::new(),
                integrity: OutputIntegrity::Complete,
            },
        };

        if stdout.integrity == OutputIntegrity::TruncatedByJudgeLimit {
            return Ok(CapturedOutput {
                stdout: stdout.data,
                stderr: Vec::new(),
                stdout_integrity: stdout.integrity,
                stderr_integrity: OutputIntegrity::Complete,
            });
        }

        self.wait()?;
        let stderr = self.stderr_stream()?;
        let (stderr_data, stderr_integrity) = if stderr.data.len() > errlimit {
            (stderr.data[..errlimit].to_vec(), OutputIntegrity::TruncatedByJudgeLimit)
        } else {
            (stderr.data.clone(), stderr.integrity)
        };

        Ok(CapturedOutput {
            stdout: stdout.data,
            stderr: stderr_data,
            stdout_integrity: stdout.integrity,
            stderr_integrity,
        })
    }

    fn read_stderr(&mut self) -> Result<Vec<u8>> {
        Ok(self.stderr_stream()?.data.clone())
    }

    fn kill(&mut self) {
        let state = lock(&self.state);
        if state.exited {
            return;
        }
        if let Err(e) = killpg(self.pid, Signal::SIGKILL) {
            log::debug!("killpg({}) failed: {}", self.pid, e);
        }
    }

    fn mark_ole(&mut self) {
        self.ole = true;
        if let Some(report) = self.report.as_mut() {
            report.output_limit_exceeded = true;
        }
    }

    fn report(&self) -> Option<&ProcessReport> {
        self.report.as_ref()
    }
}

impl Drop for LocalProcess {
    fn drop(&mut self) {
        if self.report.is_none() {
            self.kill();
            self.stdout.take();
            if let Err(e) = self.wait() {
                log::warn!("Failed to reap process {}: {}", self.pid, e);
            }
        }
        if let Some(reader) = self.stderr_reader.take() {
            let _ = reader.join();
        }
    }
}
