/// Per-case verdict record
use crate::checkers::CheckerResult;
use crate::problem::TestCase;
use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Verdict flags accumulated while grading one case.
    ///
    /// Flags combine freely. An empty set means the case was accepted.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct ResultFlags: u32 {
        /// Wrong answer
        const WA = 1 << 0;
        /// Runtime error (killed by a signal)
        const RTE = 1 << 1;
        /// Time limit exceeded
        const TLE = 1 << 2;
        /// Memory limit exceeded
        const MLE = 1 << 3;
        /// Invalid return (non-zero exit code)
        const IR = 1 << 4;
        /// Output limit exceeded
        const OLE = 1 << 5;
        /// Internal error. Grading reports judge faults as `Err`; a caller
        /// that keeps a record per case stores them with this flag through
        /// [`CaseResult::internal_error`].
        const IE = 1 << 30;
    }
}

/// Display priority for the dominant verdict code.
const CODE_PRIORITY: [(ResultFlags, &str); 7] = [
    (ResultFlags::IE, "IE"),
    (ResultFlags::TLE, "TLE"),
    (ResultFlags::MLE, "MLE"),
    (ResultFlags::OLE, "OLE"),
    (ResultFlags::RTE, "RTE"),
    (ResultFlags::IR, "IR"),
    (ResultFlags::WA, "WA"),
];

/// Verdict for one test case.
///
/// Created at the start of grading, mutated by the grader and the sandbox's
/// result population, and immutable once handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub position: usize,
    pub batch: Option<u32>,
    pub flags: ResultFlags,
    pub points: f64,
    pub total_points: f64,
    pub feedback: String,
    pub extended_feedback: String,
    /// Captured submission stdout
    #[serde(skip)]
    pub proc_output: Vec<u8>,
    /// CPU time in seconds
    pub execution_time: f64,
    /// Wall clock time in seconds
    pub wall_time: f64,
    /// Peak memory in KiB
    pub max_memory: u64,
}

impl CaseResult {
    pub fn new(case: &TestCase) -> Self {
        Self {
            position: case.position(),
            batch: case.batch(),
            flags: ResultFlags::empty(),
            points: 0.0,
            total_points: case.points(),
            feedback: String::new(),
            extended_feedback: String::new(),
            proc_output: Vec::new(),
            execution_time: 0.0,
            wall_time: 0.0,
            max_memory: 0,
        }
    }

    /// Record of a case whose grading stopped on a judge-side fault.
    pub fn internal_error(case: &TestCase, message: impl Into<String>) -> Self {
        let mut result = Self::new(case);
        result.flags = ResultFlags::IE;
        result.feedback = message.into();
        result
    }

    /// Whether the submission already failed before any checker ran.
    pub fn failed(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Merge a normalized checker judgement into this result.
    ///
    /// The case passes only if the submission had not already failed and the
    /// checker passed it. Feedback is replaced only by non-empty checker text.
    pub fn apply_check(&mut self, check: CheckerResult) {
        let passed = !self.failed() && check.passed;
        if !passed {
            self.flags |= ResultFlags::WA;
        }
        self.points = if passed { check.points } else { 0.0 };
        if let Some(feedback) = check.feedback.filter(|f| !f.is_empty()) {
            self.feedback = feedback;
        }
        if let Some(extended) = check.extended_feedback.filter(|f| !f.is_empty()) {
            self.extended_feedback = extended;
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.flags.is_empty()
    }

    /// Short code of the dominant verdict.
    pub fn verdict_code(&self) -> &'static str {
        CODE_PRIORITY
            .iter()
            .find(|(flag, _)| self.flags.contains(*flag))
            .map(|(_, code)| *code)
            .unwrap_or("AC")
    }
}
