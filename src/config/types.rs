/// Core error types for gradebox
use thiserror::Error;

/// Errors raised while grading.
///
/// Sandbox-reported outcomes (timeouts, memory breaches, crashes) are never
/// errors; they are recorded as flags on the case result. Only compile
/// failures and judge-attributable faults surface here.
#[derive(Error, Debug)]
pub enum GraderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    /// The contestant's submission did not build.
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Judge-supplied interactor sources did not build.
    #[error("Internal error: interactor failed compiling")]
    InteractorCompile(#[source] CompileError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Checker error: {0}")]
    Checker(String),
}

impl GraderError {
    /// Whether the failure is attributable to the judge rather than the contestant.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            GraderError::InteractorCompile(_) | GraderError::Internal(_) | GraderError::Checker(_)
        )
    }
}

impl From<nix::errno::Errno> for GraderError {
    fn from(err: nix::errno::Errno) -> Self {
        GraderError::Process(err.to_string())
    }
}

/// Compilation failure with the compiler's diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Faults raised by a checker while judging output.
#[derive(Error, Debug)]
pub enum CheckerError {
    /// The checker assumed text and the contestant's output was not valid UTF-8.
    #[error("invalid unicode in checked data")]
    InvalidUnicode,

    #[error("{0}")]
    Failed(String),
}

impl From<std::str::Utf8Error> for CheckerError {
    fn from(_: std::str::Utf8Error) -> Self {
        CheckerError::InvalidUnicode
    }
}

impl From<std::string::FromUtf8Error> for CheckerError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        CheckerError::InvalidUnicode
    }
}

/// Result type alias for gradebox operations
pub type Result<T> = std::result::Result<T, GraderError>;
