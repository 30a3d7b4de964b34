use crate::checkers::CheckerResult;
use crate::config::types::{GraderError, Result};
use crate::contrib::{AdapterContext, ProtocolAdapter};
use regex::bytes::Regex;

/// testlib.h exit code conventions.
#[derive(Debug, Clone)]
pub struct TestlibAdapter {
    partial: Regex,
}

const AC: i32 = 0;
const WA: i32 = 1;
const PE: i32 = 2;
const FAIL: i32 = 3;
const PARTIAL: i32 = 7;

impl TestlibAdapter {
    pub fn new() -> Result<Self> {
        let partial = Regex::new(r"(?m)^points ([-+]?\d*\.?\d+)")
            .map_err(|e| GraderError::Config(format!("invalid partial points pattern: {e}")))?;
        Ok(Self { partial })
    }

    fn partial_fraction(&self, stderr: &[u8]) -> Result<f64> {
        let captures = self.partial.captures(stderr).ok_or_else(|| {
            GraderError::Internal(format!(
                "invalid stderr for partial points: {:?}",
                String::from_utf8_lossy(stderr)
            ))
        })?;
        let fraction: f64 = std::str::from_utf8(&captures[1])
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or_else(|| GraderError::Internal("unparsable partial points".to_string()))?;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(GraderError::Internal(format!("invalid partial points: {fraction}")));
        }
        Ok(fraction)
    }
}

impl ProtocolAdapter for TestlibAdapter {
    fn name(&self) -> &str {
        "testlib"
    }

    fn parse_return_code(&self, ctx: &AdapterContext<'_>) -> Result<CheckerResult> {
        let report = ctx.report;
        if report.is_tle() || report.is_mle() || report.signal.is_some() {
            return Err(ctx.helper_error());
        }
        match report.exit_code {
            Some(AC) => Ok(ctx.passed()),
            Some(WA) | Some(PE) => Ok(ctx.failed()),
            Some(PARTIAL) => {
                let fraction = self.partial_fraction(ctx.stderr)?;
                let mut result = ctx.passed();
                result.points = ctx.max_points * fraction;
                Ok(result)
            }
            Some(FAIL) => {
                let message = format!(
                    "{} failed assertion with message {}",
                    ctx.name,
                    String::from_utf8_lossy(ctx.stderr).trim()
                );
                log::error!("{}", message);
                Err(GraderError::Internal(message))
            }
            _ => Err(ctx.helper_error()),
        }
    }
}
