use crate::executors::adapter::LanguageAdapter;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CppAdapter;

const SOURCE_EXTENSIONS: [&str; 4] = [".cpp", ".cc", ".cxx", ".c++"];

fn is_translation_unit(name: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

impl LanguageAdapter for CppAdapter {
    fn language(&self) -> &'static str {
        "cpp"
    }

    fn source_name(&self, _content: &[u8]) -> String {
        "solution.cpp".to_string()
    }

    fn compile_command(&self, workdir: &Path, sources: &[String], flags: &[String]) -> Option<Vec<String>> {
        let mut command = vec![
            "g++".to_string(),
            "-std=c++17".to_string(),
            "-O2".to_string(),
            "-pipe".to_string(),
        ];
        command.extend(flags.iter().cloned());
        command.push("-o".to_string());
        command.push(workdir.join("solution").to_string_lossy().to_string());
        // Headers shipped alongside (e.g. testlib.h) are found through the workdir.
        command.extend(
            sources
                .iter()
                .filter(|name| is_translation_unit(name))
                .map(|name| workdir.join(name).to_string_lossy().to_string()),
        );
        Some(command)
    }

    fn run_command(&self, workdir: &Path, _sources: &[String]) -> Vec<String> {
        vec![workdir.join("solution").to_string_lossy().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_command_skips_headers() {
        let sources = vec!["interactor.cpp".to_string(), "testlib.h".to_string()];
        let command = CppAdapter
            .compile_command(Path::new("/w"), &sources, &["-DONLINE_JUDGE".to_string()])
            .unwrap();
        assert_eq!(command[0], "g++");
        assert!(command.contains(&"-DONLINE_JUDGE".to_string()));
        assert!(command.contains(&"/w/interactor.cpp".to_string()));
        assert!(!command.iter().any(|arg| arg.ends_with("testlib.h")));
        assert_eq!(CppAdapter.run_command(Path::new("/w"), &sources), vec!["/w/solution"]);
    }
}
