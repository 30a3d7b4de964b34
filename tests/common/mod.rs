//! Scripted collaborators shared by the grader integration tests.
//!
//! The scripted sandbox never starts a process: every launch replays a canned
//! report and output chosen by the binary's language, and records what the
//! grader asked for.

#![allow(dead_code)]

use gradebox::checkers::{CheckContext, Checker, CheckerOutput};
use gradebox::config::judge_env::JudgeEnv;
use gradebox::contrib::AdapterRegistry;
use gradebox::executors::{Binary, CompileRequest, Compiler, LanguageCompiler};
use gradebox::grader::GraderContext;
use gradebox::problem::{CaseConfig, DataSource, TestCase};
use gradebox::sandbox::capture::OutputIntegrity;
use gradebox::sandbox::{
    CapturedOutput, FsRule, LaunchSpec, ProcessHandle, ProcessReport, Sandbox, StdioSpec,
};
use gradebox::{CheckerError, CompileError, GraderError, Result};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SUBMISSION_LANG: &str = "sublang";
pub const INTERACTOR_LANG: &str = "interlang";

/// Canned behavior of one launched binary.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub report: ProcessReport,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl Script {
    pub fn exited(code: i32) -> Self {
        Self {
            report: ProcessReport {
                exit_code: Some(code),
                cpu_time: Duration::from_millis(50),
                wall_time: Duration::from_millis(60),
                max_memory: 1024,
                ..ProcessReport::default()
            },
            ..Self::default()
        }
    }

    pub fn ok(stdout: &[u8]) -> Self {
        Self::exited(0).with_stdout(stdout)
    }

    pub fn with_stdout(mut self, stdout: &[u8]) -> Self {
        self.stdout = stdout.to_vec();
        self
    }

    pub fn with_stderr(mut self, stderr: &[u8]) -> Self {
        self.stderr = stderr.to_vec();
        self
    }

    pub fn tle(mut self) -> Self {
        self.report.cpu_limit_exceeded = true;
        self
    }

    pub fn signaled(mut self, signal: i32) -> Self {
        self.report.exit_code = None;
        self.report.signal = Some(signal);
        self
    }
}

/// What the grader handed to one launch.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub language: String,
    pub args: Vec<String>,
    pub time: Duration,
    pub wall_time: Option<Duration>,
    pub memory: u64,
    pub fsize: Option<u64>,
    pub extra_fs: Vec<FsRule>,
    pub stdin_is_fd: bool,
    pub stdout_is_fd: bool,
    pub stdout_is_piped: bool,
    /// Contents of every file argument at launch time
    pub file_args: HashMap<String, Vec<u8>>,
}

#[derive(Default)]
pub struct ScriptedSandbox {
    scripts: Mutex<HashMap<String, Script>>,
    failing: Mutex<HashSet<String>>,
    launches: Mutex<Vec<LaunchRecord>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSandbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, language: &str, script: Script) {
        self.scripts.lock().unwrap().insert(language.to_string(), script);
    }

    pub fn fail_launch(&self, language: &str) {
        self.failing.lock().unwrap().insert(language.to_string());
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn launch(&self, binary: &Binary, spec: LaunchSpec) -> Result<Box<dyn ProcessHandle>> {
        let language = binary.language().to_string();
        if self.failing.lock().unwrap().contains(&language) {
            return Err(GraderError::Process(format!("cannot launch {language}")));
        }
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&language)
            .cloned()
            .unwrap_or_else(|| Script::ok(b""));

        let file_args = spec
            .args
            .iter()
            .filter_map(|arg| std::fs::read(arg).ok().map(|data| (arg.clone(), data)))
            .collect();
        self.launches.lock().unwrap().push(LaunchRecord {
            language: language.clone(),
            args: spec.args.clone(),
            time: spec.time,
            wall_time: spec.wall_time,
            memory: spec.memory,
            fsize: spec.fsize,
            extra_fs: spec.extra_fs.clone(),
            stdin_is_fd: matches!(spec.stdin, StdioSpec::Fd(_)),
            stdout_is_fd: matches!(spec.stdout, StdioSpec::Fd(_)),
            stdout_is_piped: matches!(spec.stdout, StdioSpec::Piped),
            file_args,
        });
        self.events.lock().unwrap().push(format!("launch:{language}"));

        let piped_stdout = match spec.stdout {
            StdioSpec::Fd(fd) => {
                // A closed pipe reader makes this fail; the output is then lost.
                let _ = File::from(fd).write_all(&script.stdout);
                None
            }
            StdioSpec::Piped => Some(script.stdout.clone()),
            StdioSpec::Null => None,
        };

        Ok(Box::new(ScriptedProcess {
            language,
            script,
            piped_stdout,
            ole: false,
            waited: None,
            events: Arc::clone(&self.events),
        }))
    }
}

struct ScriptedProcess {
    language: String,
    script: Script,
    piped_stdout: Option<Vec<u8>>,
    ole: bool,
    waited: Option<ProcessReport>,
    events: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProcess {
    fn event(&self, what: &str) {
        self.events.lock().unwrap().push(format!("{what}:{}", self.language));
    }
}

impl ProcessHandle for ScriptedProcess {
    fn pid(&self) -> u32 {
        4242
    }

    fn wait(&mut self) -> Result<ProcessReport> {
        self.event("wait");
        if let Some(report) = &self.waited {
            return Ok(report.clone());
        }
        let mut report = self.script.report.clone();
        report.output_limit_exceeded |= self.ole;
        self.waited = Some(report.clone());
        Ok(report)
    }

    fn communicate(&mut self, outlimit: usize, errlimit: usize) -> Result<CapturedOutput> {
        self.event("communicate");
        let mut stdout = self.piped_stdout.take().unwrap_or_default();
        let mut stderr = self.script.stderr.clone();
        stderr.truncate(errlimit);
        if stdout.len() > outlimit {
            stdout.truncate(outlimit);
            return Ok(CapturedOutput {
                stdout,
                stderr,
                stdout_integrity: OutputIntegrity::TruncatedByJudgeLimit,
                stderr_integrity: OutputIntegrity::Complete,
            });
        }
        self.wait()?;
        Ok(CapturedOutput {
            stdout,
            stderr,
            stdout_integrity: OutputIntegrity::Complete,
            stderr_integrity: OutputIntegrity::Complete,
        })
    }

    fn read_stderr(&mut self) -> Result<Vec<u8>> {
        self.event("stderr");
        Ok(self.script.stderr.clone())
    }

    fn kill(&mut self) {
        self.event("kill");
    }

    fn mark_ole(&mut self) {
        self.event("ole");
        self.ole = true;
        if let Some(report) = self.waited.as_mut() {
            report.output_limit_exceeded = true;
        }
    }

    fn report(&self) -> Option<&ProcessReport> {
        self.waited.as_ref()
    }
}

/// Compiler that never runs anything; it can be told to reject a language.
#[derive(Default)]
pub struct ScriptedCompiler {
    failures: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<(String, Vec<Option<String>>, Vec<String>)>>,
}

impl ScriptedCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, language: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(language.to_string(), message.to_string());
    }

    /// Languages compiled so far, in order.
    pub fn compiled(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(language, _, _)| language.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<(String, Vec<Option<String>>, Vec<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Compiler for ScriptedCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Binary> {
        self.requests.lock().unwrap().push((
            request.language.clone(),
            request.sources.iter().map(|s| s.name.clone()).collect(),
            request.flags.clone(),
        ));
        if let Some(message) = self.failures.lock().unwrap().get(&request.language) {
            return Err(GraderError::Compile(CompileError::new(message.clone())));
        }
        Ok(Binary::new(request.language.clone(), vec!["/bin/true".to_string()]))
    }
}

/// How a [`CountingChecker`] answers.
#[derive(Debug, Clone)]
pub enum Verdict {
    Output(CheckerOutput),
    InvalidUnicode,
    Crash(String),
}

/// Checker that records how often it ran and what it saw.
pub struct CountingChecker {
    verdict: Verdict,
    run_on_error: bool,
    read_input: bool,
    calls: AtomicUsize,
    seen_output: Mutex<Vec<u8>>,
}

impl CountingChecker {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self::build(verdict, false, false))
    }

    pub fn running_on_error(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self::build(verdict, true, false))
    }

    pub fn reading_input(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self::build(verdict, false, true))
    }

    fn build(verdict: Verdict, run_on_error: bool, read_input: bool) -> Self {
        Self {
            verdict,
            run_on_error,
            read_input,
            calls: AtomicUsize::new(0),
            seen_output: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_output(&self) -> Vec<u8> {
        self.seen_output.lock().unwrap().clone()
    }
}

impl Checker for CountingChecker {
    fn name(&self) -> &str {
        "counting"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> std::result::Result<CheckerOutput, CheckerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_output.lock().unwrap() = ctx.submission_output.to_vec();
        if self.read_input {
            let input = ctx
                .judge_input
                .get()
                .map_err(|e| CheckerError::Failed(e.to_string()))?;
            if input.is_empty() {
                return Err(CheckerError::Failed("empty judge input".to_string()));
            }
        }
        match &self.verdict {
            Verdict::Output(output) => Ok(output.clone()),
            Verdict::InvalidUnicode => Err(CheckerError::InvalidUnicode),
            Verdict::Crash(message) => Err(CheckerError::Failed(message.clone())),
        }
    }

    fn run_on_error(&self) -> bool {
        self.run_on_error
    }
}

pub fn case(points: f64, input: &[u8], output: &[u8], checker: Arc<dyn Checker>) -> TestCase {
    TestCase::new(
        1,
        None,
        points,
        DataSource::Inline(input.to_vec()),
        DataSource::Inline(output.to_vec()),
        CaseConfig::default(),
        checker,
    )
}

/// Context whose compiler runs the real language adapters inside `sandbox`.
pub fn language_context(sandbox: Arc<ScriptedSandbox>) -> GraderContext {
    GraderContext {
        compiler: Arc::new(LanguageCompiler::new(sandbox.clone(), 0)),
        sandbox,
        adapters: Arc::new(AdapterRegistry::with_builtin().unwrap()),
        env: JudgeEnv::default(),
    }
}

pub fn context(
    sandbox: Arc<ScriptedSandbox>,
    compiler: Arc<ScriptedCompiler>,
    memfd_output: bool,
) -> GraderContext {
    let env = JudgeEnv {
        memfd_output,
        ..JudgeEnv::default()
    };
    GraderContext {
        sandbox,
        compiler,
        adapters: Arc::new(AdapterRegistry::with_builtin().unwrap()),
        env,
    }
}
