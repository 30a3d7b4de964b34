use crate::checkers::CheckerRegistry;
use crate::config::judge_env::JudgeEnv;
use crate::config::types::GraderError;
use crate::contrib::AdapterRegistry;
use crate::executors::LanguageCompiler;
use crate::grader::{Grader, GraderContext, Submission};
use crate::problem::load_problem;
use crate::result::CaseResult;
use crate::sandbox::{LocalSandbox, Sandbox};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The submission did not compile.
pub const EXIT_COMPILE_ERROR: i32 = 1;
/// Grading stopped on a judge-side fault.
pub const EXIT_INTERNAL_ERROR: i32 = 2;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a submission against every case of a problem
    Grade {
        /// Problem directory containing problem.json
        #[arg(long)]
        problem: PathBuf,
        /// Submission language (cpp, python, java)
        #[arg(long)]
        language: String,
        /// Submission source file
        #[arg(long)]
        source: PathBuf,
        /// Judge environment JSON
        #[arg(long)]
        env: Option<PathBuf>,
        /// Capture output through pipes instead of a memory-backed file
        #[arg(long)]
        pipe_output: bool,
    },
    /// Check that the language toolchains are installed
    CheckDeps {
        /// Show the version line of each tool
        #[arg(long)]
        verbose: bool,
    },
}

fn print_record(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn case_record(result: &CaseResult) -> Result<serde_json::Value> {
    let mut record = serde_json::to_value(result)?;
    if let Some(fields) = record.as_object_mut() {
        fields.insert("verdict".to_string(), result.verdict_code().into());
    }
    Ok(record)
}

fn internal_error(err: &GraderError) -> Result<i32> {
    log::error!("{}", err);
    print_record(&serde_json::json!({
        "verdict": "IE",
        "message": err.to_string(),
    }))?;
    Ok(EXIT_INTERNAL_ERROR)
}

fn grade(problem_dir: &Path, language: String, source: &Path, env: Option<&Path>, pipe_output: bool) -> Result<i32> {
    let mut env = match env {
        Some(path) => JudgeEnv::load_from_file(path)?,
        None => JudgeEnv::default(),
    };
    if pipe_output {
        env.memfd_output = false;
    }

    let checkers = CheckerRegistry::with_builtin();
    let adapters = Arc::new(AdapterRegistry::with_builtin()?);
    let (problem, cases) = load_problem(problem_dir, &checkers)?;
    let source = std::fs::read(source)
        .with_context(|| format!("Failed to read submission {}", source.display()))?;

    let sandbox: Arc<dyn Sandbox> = Arc::new(LocalSandbox);
    let compiler = Arc::new(LanguageCompiler::new(
        Arc::clone(&sandbox),
        env.compiler_memory_limit,
    ));
    let ctx = GraderContext {
        sandbox,
        compiler,
        adapters,
        env,
    };

    let grader = match Grader::new(Arc::new(problem), Submission::new(language, source), ctx) {
        Ok(grader) => grader,
        Err(GraderError::Compile(err)) => {
            print_record(&serde_json::json!({
                "verdict": "CE",
                "message": err.message,
            }))?;
            return Ok(EXIT_COMPILE_ERROR);
        }
        Err(err) => return internal_error(&err),
    };

    for case in &cases {
        match grader.grade(case) {
            Ok(result) => print_record(&case_record(&result)?)?,
            Err(err) => {
                log::error!("Case {} stopped: {}", case.position(), err);
                print_record(&case_record(&CaseResult::internal_error(case, err.to_string()))?)?;
                return Ok(EXIT_INTERNAL_ERROR);
            }
        }
    }
    Ok(0)
}

fn check_language_dependencies(verbose: bool) -> Result<i32> {
    use std::process::Command;

    let languages = [
        ("Python", vec![("python3", "--version")]),
        ("C++", vec![("g++", "--version")]),
        ("Java", vec![("java", "-version"), ("javac", "-version")]),
    ];

    let mut missing = Vec::new();
    for (name, tools) in &languages {
        let mut ok = true;
        let mut versions = Vec::new();
        for (tool, version_arg) in tools {
            match Command::new(tool).arg(version_arg).output() {
                Ok(output) if output.status.success() => {
                    let text = if output.stdout.is_empty() {
                        String::from_utf8_lossy(&output.stderr)
                    } else {
                        String::from_utf8_lossy(&output.stdout)
                    };
                    let first = text.lines().next().unwrap_or("").trim().to_string();
                    versions.push(format!("  {} -> {}", tool, first));
                }
                Ok(_) => {
                    ok = false;
                    versions.push(format!("  {} -> FAILED", tool));
                }
                Err(_) => {
                    ok = false;
                    versions.push(format!("  {} -> NOT FOUND", tool));
                }
            }
        }

        println!("{} - {}", name, if ok { "OK" } else { "MISSING" });
        if verbose {
            for line in versions {
                println!("{}", line);
            }
        }
        if !ok {
            missing.push(*name);
        }
    }

    if missing.is_empty() {
        Ok(0)
    } else {
        eprintln!("Missing toolchains: {}", missing.join(", "));
        Ok(1)
    }
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Grade {
            problem,
            language,
            source,
            env,
            pipe_output,
        } => grade(&problem, language, &source, env.as_deref(), pipe_output).unwrap_or_else(|err| {
            log::error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            EXIT_INTERNAL_ERROR
        }),
        Commands::CheckDeps { verbose } => check_language_dependencies(verbose)?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
