/// Interactor-mediated grading
///
/// The submission and a judge-supplied interactor run concurrently, each
/// reading the other's stdout. The interactor's outcome is interpreted by a
/// protocol adapter.
use crate::checkers::CheckerOutput;
use crate::config::interactive::InteractiveConfig;
use crate::config::seconds;
use crate::config::types::{GraderError, Result};
use crate::contrib::{AdapterContext, ProtocolAdapter};
use crate::executors::{Binary, CompileRequest, SourceFile};
use crate::grader::pipes::CrossPipes;
use crate::grader::standard::{compile_submission, scaled_wall_time, StandardGrader};
use crate::grader::{GraderContext, GradingSteps, Submission};
use crate::problem::{Problem, TestCase};
use crate::result::CaseResult;
use crate::sandbox::{FsRule, LaunchSpec, ProcessHandle, StdioSpec};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const INTERACTOR_NAME: &str = "interactor";
/// The interactor gets no writable scratch output.
const NULL_OUTPUT: &str = "/dev/null";

/// Expand an interactor argument template.
///
/// The template is split on whitespace first, so substituted paths always
/// stay single arguments.
pub fn format_interactor_args(
    template: &str,
    input_file: &Path,
    output_file: &Path,
    answer_file: &Path,
) -> Vec<String> {
    let input_file = input_file.to_string_lossy();
    let output_file = output_file.to_string_lossy();
    let answer_file = answer_file.to_string_lossy();
    template
        .split_whitespace()
        .map(|token| {
            token
                .replace("{input_file}", &input_file)
                .replace("{output_file}", &output_file)
                .replace("{answer_file}", &answer_file)
        })
        .collect()
}

/// Grades a submission that converses with an interactor.
pub struct InteractiveGrader {
    base: StandardGrader,
    config: InteractiveConfig,
    interactor: Binary,
    adapter: Arc<dyn ProtocolAdapter>,
    /// Interactor CPU time and memory (KiB) ceilings
    limits: (Duration, u64),
}

fn interactor_limits(problem: &Problem, config: &InteractiveConfig, ctx: &GraderContext) -> Result<(Duration, u64)> {
    let time = config
        .preprocessing_time()?
        .checked_add(problem.time_limit)
        .ok_or_else(|| GraderError::Config("interactor time limit overflows".to_string()))?;
    let memory = config.memory_limit.unwrap_or(ctx.env.generator_memory_limit);
    Ok((time, memory))
}

/// One launched interactive case.
pub struct InteractiveRun {
    submission: Box<dyn ProcessHandle>,
    pipes: CrossPipes,
    interactor: Option<Box<dyn ProcessHandle>>,
    interactor_wall_time: Duration,
}

fn compile_interactor(problem: &Problem, config: &InteractiveConfig, ctx: &GraderContext) -> Result<Binary> {
    let mut sources = Vec::new();
    for file in config.files.to_vec() {
        let path = problem.root.join(&file);
        let content = std::fs::read(&path).map_err(|e| {
            GraderError::Internal(format!(
                "failed to read interactor source {}: {}",
                path.display(),
                e
            ))
        })?;
        let name = Path::new(&file)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(file);
        sources.push(SourceFile::named(name, content));
    }

    let request = CompileRequest {
        sources,
        flags: config.flags.clone(),
        language: config.lang.clone(),
        time_limit: match config.compiler_time_limit.filter(|secs| *secs > 0.0) {
            Some(secs) => seconds(secs, "compiler_time_limit")?,
            None => ctx.env.compiler_time_limit()?,
        },
        unbuffered: config.unbuffered,
    };
    ctx.compiler.compile(&request).map_err(|e| {
        log::error!("Interactor for {} failed compiling: {}", problem.id, e);
        match e {
            GraderError::Compile(diagnostics) => GraderError::InteractorCompile(diagnostics),
            other => other,
        }
    })
}

impl InteractiveGrader {
    /// Validate the adapter and interactor limits, compile the interactor,
    /// then the submission.
    ///
    /// Judge-side faults surface before anything of the contestant's is built.
    pub fn new(problem: Arc<Problem>, submission: Submission, ctx: GraderContext) -> Result<Self> {
        let config = problem.config.interactive.clone().ok_or_else(|| {
            GraderError::Config(format!("problem {} has no interactive section", problem.id))
        })?;
        let adapter = ctx.adapters.get(&config.adapter)?;
        let limits = interactor_limits(&problem, &config, &ctx)?;
        let interactor = compile_interactor(&problem, &config, &ctx)?;
        let binary = compile_submission(&problem, &submission, &ctx)?;
        log::info!(
            "Interactive grader ready for {} ({}, {} adapter)",
            problem.id,
            submission.language,
            config.adapter
        );
        Ok(Self {
            base: StandardGrader::with_binary(problem, submission, binary, ctx),
            config,
            interactor,
            adapter,
            limits,
        })
    }

    pub fn interactor(&self) -> &Binary {
        &self.interactor
    }

    fn args_template(&self) -> &str {
        self.config
            .args_format_string
            .as_deref()
            .unwrap_or_else(|| self.adapter.interactor_args_format_string())
    }
}

impl GradingSteps for InteractiveGrader {
    type Run = InteractiveRun;

    fn launch_process(&self, case: &TestCase) -> Result<InteractiveRun> {
        let interactor_wall_time = scaled_wall_time(self.limits.0, case.config().wall_time_factor)?;
        let mut spec = self.base.submission_spec(case)?;
        let mut pipes = CrossPipes::new()?;
        spec.stdin = StdioSpec::Fd(pipes.take_submission_stdin()?);
        spec.stdout = StdioSpec::Fd(pipes.take_submission_stdout()?);
        spec.stderr = StdioSpec::Piped;

        let submission = self.base.ctx.sandbox.launch(&self.base.binary, spec)?;
        Ok(InteractiveRun {
            submission,
            pipes,
            interactor: None,
            interactor_wall_time,
        })
    }

    fn interact_with_process(
        &self,
        case: &TestCase,
        run: &mut InteractiveRun,
        _result: &mut CaseResult,
    ) -> Result<Vec<u8>> {
        let (time_limit, memory_limit) = self.limits;

        let input = case.input_data_io()?;
        let mut answer = NamedTempFile::new()?;
        answer.write_all(&case.output_data()?)?;
        answer.flush()?;

        let mut spec = LaunchSpec::new(time_limit, memory_limit);
        spec.wall_time = Some(run.interactor_wall_time);
        spec.args = format_interactor_args(
            self.args_template(),
            input.to_path(),
            Path::new(NULL_OUTPUT),
            answer.path(),
        );
        spec.stdin = StdioSpec::Fd(run.pipes.take_interactor_stdin()?);
        spec.stdout = StdioSpec::Fd(run.pipes.take_interactor_stdout()?);
        spec.stderr = StdioSpec::Piped;
        spec.extra_fs = vec![FsRule::ExactFile(input.to_path().to_path_buf())];
        log::debug!("Launching interactor with {:?}", spec.args);

        let launched = self.base.ctx.sandbox.launch(&self.interactor, spec);
        run.pipes.close();
        let interactor = run.interactor.insert(launched?);

        run.submission.wait()?;
        interactor.wait()?;

        run.submission.read_stderr()
    }

    fn populate_result(&self, stderr: &[u8], result: &mut CaseResult, run: &InteractiveRun) -> Result<()> {
        self.base
            .ctx
            .sandbox
            .populate_result(stderr, result, run.submission.as_ref())
    }

    fn check_result(
        &self,
        case: &TestCase,
        result: &CaseResult,
        run: &mut InteractiveRun,
    ) -> Result<CheckerOutput> {
        // The interactor is judged before the submission's own flags so a
        // failing interactor is never hidden behind a submission failure.
        let interactor = run
            .interactor
            .as_mut()
            .ok_or_else(|| GraderError::Internal("interactor was never launched".to_string()))?;
        let stderr = interactor.read_stderr()?;
        let report = interactor.wait()?;
        let (time_limit, memory_limit) = self.limits;

        let ctx = AdapterContext {
            report: &report,
            binary: &self.interactor,
            max_points: case.points(),
            time_limit,
            memory_limit,
            feedback: self
                .config
                .feedback
                .then(|| String::from_utf8_lossy(&stderr).into_owned()),
            name: INTERACTOR_NAME,
            stderr: &stderr,
        };
        let parsed = self.adapter.parse_return_code(&ctx)?;

        if result.failed() {
            return Ok(CheckerOutput::Fail);
        }
        Ok(CheckerOutput::Graded(parsed))
    }
}
