//! Compilation and launchable binaries.
//!
//! The grading core stays language-agnostic. Language adapters define the
//! compile and run commands for each language; [`LanguageCompiler`] drives
//! them through the sandbox.

pub mod adapter;
pub mod compiler;
pub mod languages;
pub mod registry;

pub use compiler::LanguageCompiler;

use crate::config::types::Result;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// A compiled, sandbox-launchable artifact.
///
/// Owns its build workspace, which is removed when the binary is dropped.
#[derive(Debug)]
pub struct Binary {
    language: String,
    argv: Vec<String>,
    env: Vec<(String, String)>,
    fsize: u64,
    address_space_limit: bool,
    workspace: Option<TempDir>,
}

impl Binary {
    pub fn new(language: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            language: language.into(),
            argv,
            env: Vec::new(),
            fsize: 0,
            address_space_limit: true,
            workspace: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_fsize(mut self, fsize: u64) -> Self {
        self.fsize = fsize;
        self
    }

    pub fn with_workspace(mut self, workspace: TempDir) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Runtimes that reserve large virtual ranges up front (the JVM) are
    /// judged by peak resident memory only.
    pub fn without_address_space_limit(mut self) -> Self {
        self.address_space_limit = false;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Output-size footprint the binary was built with, in bytes.
    pub fn fsize(&self) -> u64 {
        self.fsize
    }

    pub fn limits_address_space(&self) -> bool {
        self.address_space_limit
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workspace.as_ref().map(TempDir::path)
    }
}

/// One source file of a compile request.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// File name; none lets the language pick its conventional main file name
    pub name: Option<String>,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn named(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn main(content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub sources: Vec<SourceFile>,
    pub flags: Vec<String>,
    pub language: String,
    pub time_limit: Duration,
    pub unbuffered: bool,
}

/// Compilation collaborator.
///
/// Only diagnostics about the sources come back as [`GraderError::Compile`];
/// a compiler that cannot be run at all is the judge's fault and surfaces as
/// any other error.
///
/// [`GraderError::Compile`]: crate::GraderError::Compile
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<Binary>;
}
