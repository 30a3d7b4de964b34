/// Single-process grading
use crate::checkers::{CheckContext, CheckerOutput, CheckerResult};
use crate::config::types::{CheckerError, GraderError, Result};
use crate::executors::{Binary, CompileRequest, SourceFile};
use crate::grader::{GraderContext, GradingSteps, Submission};
use crate::problem::{CaseInput, LazyBytes, Problem, TestCase};
use crate::result::CaseResult;
use crate::sandbox::{LaunchSpec, MemoryIO, ProcessHandle, StdioSpec, STDERR_LIMIT};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Duration;

/// Smallest memory-backed capture buffer.
const MIN_CAPTURE_FSIZE: u64 = 1024 * 1024;
/// Slack past the output limit so a breach is observable rather than fatal.
const CAPTURE_SLACK: u64 = 1024;

/// Grades a submission that reads stdin and writes stdout.
pub struct StandardGrader {
    pub(crate) problem: Arc<Problem>,
    pub(crate) submission: Submission,
    pub(crate) binary: Binary,
    pub(crate) ctx: GraderContext,
}

/// One launched standard case.
pub struct StandardRun {
    process: Box<dyn ProcessHandle>,
    capture: Option<MemoryIO>,
    _input: CaseInput,
}

pub(crate) fn compile_submission(
    problem: &Problem,
    submission: &Submission,
    ctx: &GraderContext,
) -> Result<Binary> {
    let request = CompileRequest {
        sources: vec![SourceFile::main(submission.source.clone())],
        flags: Vec::new(),
        language: submission.language.clone(),
        time_limit: ctx.env.compiler_time_limit()?,
        unbuffered: problem.config.unbuffered,
    };
    ctx.compiler.compile(&request).map_err(|e| {
        match &e {
            GraderError::Compile(_) => log::info!("Submission to {} failed to compile", problem.id),
            other => log::error!("Could not compile submission to {}: {}", problem.id, other),
        }
        e
    })
}

/// `time` stretched by `factor`, never below `time` itself.
pub(crate) fn scaled_wall_time(time: Duration, factor: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(time.as_secs_f64() * factor.max(1.0))
        .map_err(|_| GraderError::Config(format!("wall time factor {factor} is out of range")))
}

impl StandardGrader {
    pub fn new(problem: Arc<Problem>, submission: Submission, ctx: GraderContext) -> Result<Self> {
        let binary = compile_submission(&problem, &submission, &ctx)?;
        log::info!("Standard grader ready for {} ({})", problem.id, submission.language);
        Ok(Self::with_binary(problem, submission, binary, ctx))
    }

    /// Build a grader around an already compiled submission.
    pub fn with_binary(
        problem: Arc<Problem>,
        submission: Submission,
        binary: Binary,
        ctx: GraderContext,
    ) -> Self {
        Self {
            problem,
            submission,
            binary,
            ctx,
        }
    }

    pub fn binary(&self) -> &Binary {
        &self.binary
    }

    /// Submission limits for `case`, with the wall clock never below CPU time.
    pub(crate) fn submission_spec(&self, case: &TestCase) -> Result<LaunchSpec> {
        let time = self.problem.time_limit;
        let mut spec = LaunchSpec::new(time, self.problem.memory_limit);
        spec.wall_time = Some(scaled_wall_time(time, case.config().wall_time_factor)?);
        spec.symlinks = case.config().symlinks.clone();
        Ok(spec)
    }

    /// Size of the memory-backed stdout buffer for `case`.
    pub fn capture_fsize(&self, case: &TestCase) -> u64 {
        let limit = case.config().output_limit_length as u64;
        self.binary
            .fsize()
            .max(limit.saturating_add(CAPTURE_SLACK))
            .max(MIN_CAPTURE_FSIZE)
    }

    /// Run the case's checker, unless the submission already failed and the
    /// checker does not run on error.
    pub(crate) fn run_checker(&self, case: &TestCase, result: &CaseResult) -> Result<CheckerOutput> {
        let checker = case.checker();
        if result.failed() && !checker.run_on_error() {
            log::debug!("Skipping checker {} for failed case {}", checker.name(), case.position());
            return Ok(CheckerOutput::Fail);
        }

        let judge_output = case.output_data()?;
        let judge_input = LazyBytes::from_case(case);
        let ctx = CheckContext {
            submission_output: &result.proc_output,
            judge_output: &judge_output,
            submission_source: &self.submission.source,
            judge_input: &judge_input,
            point_value: case.points(),
            case_position: case.position(),
            batch: case.batch(),
            submission_language: &self.submission.language,
            binary_data: case.config().binary_data,
            execution_time: result.execution_time,
            problem_id: &self.problem.id,
            case,
            result,
        };

        match checker.check(&ctx) {
            Ok(output) => Ok(output),
            Err(CheckerError::InvalidUnicode) => Ok(CheckerOutput::Graded(
                CheckerResult::new(false, 0.0).with_feedback("invalid unicode"),
            )),
            Err(CheckerError::Failed(message)) => {
                log::error!("Checker {} failed on case {}: {}", checker.name(), case.position(), message);
                Err(GraderError::Checker(message))
            }
        }
    }
}

impl GradingSteps for StandardGrader {
    type Run = StandardRun;

    fn launch_process(&self, case: &TestCase) -> Result<StandardRun> {
        let input = case.input_data_io()?;
        let mut spec = self.submission_spec(case)?;
        spec.stdin = StdioSpec::Fd(OwnedFd::from(input.open()?));
        spec.stderr = StdioSpec::Piped;

        let capture = if self.ctx.env.memfd_output {
            let memory = MemoryIO::new()?;
            spec.stdout = StdioSpec::Fd(memory.to_stdio()?);
            spec.fsize = Some(self.capture_fsize(case));
            Some(memory)
        } else {
            spec.stdout = StdioSpec::Piped;
            None
        };

        let process = self.ctx.sandbox.launch(&self.binary, spec)?;
        Ok(StandardRun {
            process,
            capture,
            _input: input,
        })
    }

    fn interact_with_process(
        &self,
        case: &TestCase,
        run: &mut StandardRun,
        result: &mut CaseResult,
    ) -> Result<Vec<u8>> {
        let limit = case.config().output_limit_length;

        if let Some(memory) = &run.capture {
            run.process.wait()?;
            if memory.size()? > limit as u64 {
                run.process.mark_ole();
            }
            result.proc_output = memory.to_bytes()?;
            return run.process.read_stderr();
        }

        let output = run.process.communicate(limit, STDERR_LIMIT)?;
        let truncated = output.stdout_truncated();
        result.proc_output = output.stdout;
        if truncated {
            run.process.kill();
            run.process.mark_ole();
            run.process.wait()?;
            return Ok(Vec::new());
        }
        Ok(output.stderr)
    }

    fn populate_result(&self, stderr: &[u8], result: &mut CaseResult, run: &StandardRun) -> Result<()> {
        self.ctx
            .sandbox
            .populate_result(stderr, result, run.process.as_ref())
    }

    fn check_result(
        &self,
        case: &TestCase,
        result: &CaseResult,
        _run: &mut StandardRun,
    ) -> Result<CheckerOutput> {
        self.run_checker(case, result)
    }
}
