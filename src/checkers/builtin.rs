use crate::checkers::{CheckContext, Checker, CheckerOutput, CheckerResult};
use crate::config::types::CheckerError;

/// Whitespace-insensitive token comparison.
#[derive(Debug, Clone, Default)]
pub struct StandardChecker;

/// Exact comparison, ignoring only trailing whitespace.
#[derive(Debug, Clone, Default)]
pub struct IdenticalChecker;

fn tokens(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    &data[..end]
}

pub(crate) fn tokens_match(expected: &[u8], actual: &[u8]) -> bool {
    tokens(expected).eq(tokens(actual))
}

impl Checker for StandardChecker {
    fn name(&self) -> &str {
        "standard"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        Ok(tokens_match(ctx.judge_output, ctx.submission_output).into())
    }
}

impl Checker for IdenticalChecker {
    fn name(&self) -> &str {
        "identical"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckerOutput, CheckerError> {
        let expected = trim_trailing_whitespace(ctx.judge_output);
        let actual = trim_trailing_whitespace(ctx.submission_output);
        if expected == actual {
            return Ok(CheckerOutput::Pass);
        }
        if !ctx.binary_data && tokens_match(expected, actual) {
            return Ok(CheckerOutput::Graded(
                CheckerResult::new(false, 0.0)
                    .with_feedback("Presentation Error, check your whitespace"),
            ));
        }
        Ok(CheckerOutput::Fail)
    }
}
