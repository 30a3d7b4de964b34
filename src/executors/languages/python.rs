use crate::executors::adapter::LanguageAdapter;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct PythonAdapter;

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> &'static str {
        "python"
    }

    fn source_name(&self, _content: &[u8]) -> String {
        "solution.py".to_string()
    }

    fn compile_command(&self, _workdir: &Path, _sources: &[String], _flags: &[String]) -> Option<Vec<String>> {
        None
    }

    fn run_command(&self, workdir: &Path, sources: &[String]) -> Vec<String> {
        let main = sources
            .iter()
            .find(|name| name.ends_with(".py"))
            .map(String::as_str)
            .unwrap_or("solution.py");
        vec![
            "python3".to_string(),
            "-B".to_string(),
            "-S".to_string(),
            workdir.join(main).to_string_lossy().to_string(),
        ]
    }

    fn run_env(&self, unbuffered: bool) -> Vec<(String, String)> {
        if unbuffered {
            vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_compile_stage() {
        assert!(PythonAdapter.compile_command(Path::new("/w"), &[], &[]).is_none());
    }

    #[test]
    fn test_unbuffered_env() {
        assert_eq!(
            PythonAdapter.run_env(true),
            vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())]
        );
        assert!(PythonAdapter.run_env(false).is_empty());
    }
}
