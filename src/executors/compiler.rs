use crate::config::types::{CompileError, GraderError, Result};
use crate::executors::adapter::LanguageAdapter;
use crate::executors::registry::adapter_for;
use crate::executors::{Binary, CompileRequest, Compiler};
use crate::sandbox::{LaunchSpec, Sandbox, StdioSpec};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Diagnostics kept from a compiler run, per stream.
const COMPILER_OUTPUT_LIMIT: usize = 64 * 1024;

/// Builds sources with the language adapters, running compilers in the sandbox.
pub struct LanguageCompiler {
    sandbox: Arc<dyn Sandbox>,
    /// KiB
    memory_limit: u64,
}

fn validate_source_name(name: &str) -> std::result::Result<(), CompileError> {
    let path = Path::new(name);
    let plain = path.components().count() == 1
        && path.file_name().is_some_and(|file| file == path.as_os_str());
    if plain {
        Ok(())
    } else {
        Err(CompileError::new(format!("invalid source file name: {name}")))
    }
}

impl LanguageCompiler {
    pub fn new(sandbox: Arc<dyn Sandbox>, memory_limit: u64) -> Self {
        Self {
            sandbox,
            memory_limit,
        }
    }

    fn run_compiler(
        &self,
        adapter: &dyn LanguageAdapter,
        command: Vec<String>,
        workdir: &Path,
        time_limit: Duration,
    ) -> Result<()> {
        let mut compiler = Binary::new(adapter.language(), command);
        if !adapter.limits_address_space() {
            compiler = compiler.without_address_space_limit();
        }

        let mut spec = LaunchSpec::new(time_limit, self.memory_limit);
        spec.wall_time = Some(time_limit);
        spec.stdout = StdioSpec::Piped;
        spec.stderr = StdioSpec::Piped;
        spec.workdir = Some(workdir.to_path_buf());

        let mut process = self
            .sandbox
            .launch(&compiler, spec)
            .map_err(|e| GraderError::Internal(format!("failed to start compiler: {e}")))?;
        let output = process
            .communicate(COMPILER_OUTPUT_LIMIT, COMPILER_OUTPUT_LIMIT)
            .map_err(|e| GraderError::Internal(format!("failed to read compiler output: {e}")))?;
        if output.stdout_truncated() {
            process.kill();
        }
        let report = process
            .wait()
            .map_err(|e| GraderError::Internal(format!("failed to wait for compiler: {e}")))?;

        if report.is_tle() {
            return Err(CompileError::new(format!(
                "compiler timed out (> {} seconds)",
                time_limit.as_secs_f64()
            ))
            .into());
        }
        if !report.succeeded() {
            let mut message = String::from_utf8_lossy(&output.stderr).into_owned();
            message.push_str(&String::from_utf8_lossy(&output.stdout));
            if message.trim().is_empty() {
                message = match (report.exit_code, report.signal_name()) {
                    (_, Some(signal)) => format!("compiler killed by {signal}"),
                    (Some(code), None) => format!("compiler exited with code {code}"),
                    (None, None) => "compiler failed".to_string(),
                };
            }
            return Err(CompileError::new(message).into());
        }
        Ok(())
    }
}

impl Compiler for LanguageCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Binary> {
        let adapter = adapter_for(&request.language)
            .ok_or_else(|| CompileError::new(format!("unsupported language: {}", request.language)))?;

        let workspace = tempfile::Builder::new()
            .prefix("gradebox-build-")
            .tempdir()
            .map_err(|e| GraderError::Internal(format!("failed to create build directory: {e}")))?;

        let mut names = Vec::with_capacity(request.sources.len());
        for source in &request.sources {
            let name = match &source.name {
                Some(name) => name.clone(),
                None => adapter.source_name(&source.content),
            };
            validate_source_name(&name)?;
            std::fs::write(workspace.path().join(&name), &source.content)
                .map_err(|e| GraderError::Internal(format!("failed to write {name}: {e}")))?;
            names.push(name);
        }

        if let Some(command) = adapter.compile_command(workspace.path(), &names, &request.flags) {
            log::debug!("Compiling {:?} with {:?}", names, command);
            self.run_compiler(adapter.as_ref(), command, workspace.path(), request.time_limit)?;
        }

        let mut binary = Binary::new(adapter.language(), adapter.run_command(workspace.path(), &names));
        for (key, value) in adapter.run_env(request.unbuffered) {
            binary = binary.with_env(key, value);
        }
        if !adapter.limits_address_space() {
            binary = binary.without_address_space_limit();
        }
        log::info!("Built {} binary from {} source file(s)", adapter.language(), names.len());
        Ok(binary.with_workspace(workspace))
    }
}
