use crate::checkers::CheckerResult;
use crate::config::types::Result;
use crate::contrib::{AdapterContext, ProtocolAdapter};

/// Exit code 0 accepts, 1 rejects; anything else is a helper fault.
#[derive(Debug, Clone, Default)]
pub struct DefaultAdapter;

const AC: i32 = 0;
const WA: i32 = 1;

impl ProtocolAdapter for DefaultAdapter {
    fn name(&self) -> &str {
        "default"
    }

    fn parse_return_code(&self, ctx: &AdapterContext<'_>) -> Result<CheckerResult> {
        let report = ctx.report;
        if report.is_tle() || report.is_mle() || report.signal.is_some() {
            return Err(ctx.helper_error());
        }
        match report.exit_code {
            Some(AC) => Ok(ctx.passed()),
            Some(WA) => Ok(ctx.failed()),
            _ => Err(ctx.helper_error()),
        }
    }
}
