/// Test cases and their lazily loaded data
use crate::checkers::Checker;
use crate::config::types::Result;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Per-case execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaseConfig {
    /// Link name to target inside the submission's view of the filesystem
    pub symlinks: BTreeMap<String, String>,
    /// Wall clock ceiling as a multiple of the CPU time limit
    pub wall_time_factor: f64,
    /// Maximum captured stdout, in bytes
    pub output_limit_length: usize,
    /// Output is binary and must be compared without text decoding
    pub binary_data: bool,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            symlinks: BTreeMap::new(),
            wall_time_factor: 3.0,
            output_limit_length: 25 * 1024 * 1024,
            binary_data: false,
        }
    }
}

/// Where a case's input or expected output comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Inline(Vec<u8>),
    File(PathBuf),
}

impl DataSource {
    fn load(&self) -> Result<Arc<[u8]>> {
        match self {
            DataSource::Inline(data) => Ok(Arc::from(data.as_slice())),
            DataSource::File(path) => Ok(Arc::from(std::fs::read(path)?)),
        }
    }
}

/// Path-like handle over a case's input data.
///
/// Inline data is materialized into a temporary file that lives as long as any
/// handle to it or until the case releases its data.
#[derive(Debug, Clone)]
pub struct CaseInput {
    path: PathBuf,
    _materialized: Option<Arc<NamedTempFile>>,
}

impl CaseInput {
    pub fn to_path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh read handle positioned at the start of the data.
    pub fn open(&self) -> Result<File> {
        Ok(File::open(&self.path)?)
    }
}

/// One grading unit.
pub struct TestCase {
    position: usize,
    batch: Option<u32>,
    points: f64,
    input: DataSource,
    output: DataSource,
    config: CaseConfig,
    checker: Arc<dyn Checker>,
    input_cache: Mutex<Option<Arc<[u8]>>>,
    output_cache: Mutex<Option<Arc<[u8]>>>,
    materialized: Mutex<Option<Arc<NamedTempFile>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cached(cache: &Mutex<Option<Arc<[u8]>>>, source: &DataSource) -> Result<Arc<[u8]>> {
    let mut slot = lock(cache);
    if let Some(data) = slot.as_ref() {
        return Ok(Arc::clone(data));
    }
    let data = source.load()?;
    *slot = Some(Arc::clone(&data));
    Ok(data)
}

impl TestCase {
    pub fn new(
        position: usize,
        batch: Option<u32>,
        points: f64,
        input: DataSource,
        output: DataSource,
        config: CaseConfig,
        checker: Arc<dyn Checker>,
    ) -> Self {
        Self {
            position,
            batch,
            points,
            input,
            output,
            config,
            checker,
            input_cache: Mutex::new(None),
            output_cache: Mutex::new(None),
            materialized: Mutex::new(None),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn batch(&self) -> Option<u32> {
        self.batch
    }

    pub fn points(&self) -> f64 {
        self.points
    }

    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    pub fn checker(&self) -> &Arc<dyn Checker> {
        &self.checker
    }

    pub fn input_data(&self) -> Result<Arc<[u8]>> {
        cached(&self.input_cache, &self.input)
    }

    pub fn output_data(&self) -> Result<Arc<[u8]>> {
        cached(&self.output_cache, &self.output)
    }

    /// Input as something with a filesystem path.
    pub fn input_data_io(&self) -> Result<CaseInput> {
        if let DataSource::File(path) = &self.input {
            return Ok(CaseInput {
                path: path.clone(),
                _materialized: None,
            });
        }

        let mut slot = lock(&self.materialized);
        let file = match slot.as_ref() {
            Some(file) => Arc::clone(file),
            None => {
                let mut file = NamedTempFile::new()?;
                file.write_all(&self.input_data()?)?;
                file.flush()?;
                let file = Arc::new(file);
                *slot = Some(Arc::clone(&file));
                file
            }
        };
        Ok(CaseInput {
            path: file.path().to_path_buf(),
            _materialized: Some(file),
        })
    }

    /// Drop cached buffers and the materialized input file.
    pub fn free_data(&self) {
        lock(&self.input_cache).take();
        lock(&self.output_cache).take();
        lock(&self.materialized).take();
    }

    pub fn is_data_loaded(&self) -> bool {
        lock(&self.input_cache).is_some()
            || lock(&self.output_cache).is_some()
            || lock(&self.materialized).is_some()
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("position", &self.position)
            .field("batch", &self.batch)
            .field("points", &self.points)
            .field("checker", &self.checker.name())
            .finish()
    }
}

/// Judge input handed to checkers, read only on first access.
pub struct LazyBytes<'a> {
    load: Box<dyn Fn() -> Result<Arc<[u8]>> + 'a>,
    value: OnceCell<Arc<[u8]>>,
}

impl<'a> LazyBytes<'a> {
    pub fn new(load: impl Fn() -> Result<Arc<[u8]>> + 'a) -> Self {
        Self {
            load: Box::new(load),
            value: OnceCell::new(),
        }
    }

    pub fn from_case(case: &'a TestCase) -> Self {
        Self::new(move || case.input_data())
    }

    pub fn get(&self) -> Result<&[u8]> {
        if let Some(value) = self.value.get() {
            return Ok(&value[..]);
        }
        let loaded = (self.load)()?;
        Ok(&self.value.get_or_init(|| loaded)[..])
    }

    pub fn is_loaded(&self) -> bool {
        self.value.get().is_some()
    }
}
