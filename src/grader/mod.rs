//! Per-case grading orchestration.
//!
//! Every grader runs the same sequence for a case: launch, interact, populate
//! the result from process telemetry, check, merge, and release the case's
//! data. The steps are supplied by [`GradingSteps`]; [`Grader`] is the closed
//! set of variants.

pub mod interactive;
pub mod pipes;
pub mod standard;

pub use interactive::InteractiveGrader;
pub use pipes::CrossPipes;
pub use standard::StandardGrader;

use crate::checkers::CheckerOutput;
use crate::config::judge_env::JudgeEnv;
use crate::config::types::Result;
use crate::contrib::AdapterRegistry;
use crate::executors::Compiler;
use crate::problem::{Problem, TestCase};
use crate::result::CaseResult;
use crate::sandbox::Sandbox;
use std::sync::Arc;

/// Collaborators injected into every grader.
#[derive(Clone)]
pub struct GraderContext {
    pub sandbox: Arc<dyn Sandbox>,
    pub compiler: Arc<dyn Compiler>,
    pub adapters: Arc<AdapterRegistry>,
    pub env: JudgeEnv,
}

/// The contestant's code.
#[derive(Debug, Clone)]
pub struct Submission {
    pub language: String,
    pub source: Vec<u8>,
}

impl Submission {
    pub fn new(language: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
        }
    }
}

/// The overridable steps of grading one case.
pub trait GradingSteps {
    /// Per-case state that lives from launch until the case is graded.
    type Run;

    fn launch_process(&self, case: &TestCase) -> Result<Self::Run>;

    /// Drive the launched process(es) to completion, capturing stdout into
    /// `result`. Returns the submission's stderr.
    fn interact_with_process(
        &self,
        case: &TestCase,
        run: &mut Self::Run,
        result: &mut CaseResult,
    ) -> Result<Vec<u8>>;

    fn populate_result(&self, stderr: &[u8], result: &mut CaseResult, run: &Self::Run) -> Result<()>;

    fn check_result(
        &self,
        case: &TestCase,
        result: &CaseResult,
        run: &mut Self::Run,
    ) -> Result<CheckerOutput>;
}

/// Grade one case with `steps`, releasing the case's data on every exit path.
pub fn grade_case<G: GradingSteps + ?Sized>(steps: &G, case: &TestCase) -> Result<CaseResult> {
    let outcome = run_case(steps, case);
    case.free_data();
    outcome
}

fn run_case<G: GradingSteps + ?Sized>(steps: &G, case: &TestCase) -> Result<CaseResult> {
    let mut result = CaseResult::new(case);
    let mut run = steps.launch_process(case)?;
    let stderr = steps.interact_with_process(case, &mut run, &mut result)?;
    steps.populate_result(&stderr, &mut result, &run)?;

    let check = steps.check_result(case, &result, &mut run)?;
    result.apply_check(check.normalize(case.points()));

    log::debug!(
        "Case {} graded {} ({}/{} points, {:.3}s, {} KiB)",
        case.position(),
        result.verdict_code(),
        result.points,
        case.points(),
        result.execution_time,
        result.max_memory
    );
    Ok(result)
}

/// A grader for one submission to one problem.
pub enum Grader {
    Standard(StandardGrader),
    Interactive(InteractiveGrader),
}

impl Grader {
    /// Build the grader variant the problem calls for, compiling everything it needs.
    pub fn new(problem: Arc<Problem>, submission: Submission, ctx: GraderContext) -> Result<Self> {
        if problem.is_interactive() {
            Ok(Grader::Interactive(InteractiveGrader::new(problem, submission, ctx)?))
        } else {
            Ok(Grader::Standard(StandardGrader::new(problem, submission, ctx)?))
        }
    }

    pub fn grade(&self, case: &TestCase) -> Result<CaseResult> {
        match self {
            Grader::Standard(grader) => grade_case(grader, case),
            Grader::Interactive(grader) => grade_case(grader, case),
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Grader::Interactive(_))
    }
}
