use crate::executors::adapter::LanguageAdapter;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct JavaAdapter;

fn detect_class_name(content: &[u8]) -> String {
    let content = String::from_utf8_lossy(content);
    for line in content.lines() {
        let trimmed = line.trim();
        let rest = trimmed
            .strip_prefix("public final class ")
            .or_else(|| trimmed.strip_prefix("public class "));
        if let Some(rest) = rest {
            let name = rest
                .split(|c: char| c.is_whitespace() || c == '{')
                .next()
                .unwrap_or("")
                .trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    "Main".to_string()
}

impl LanguageAdapter for JavaAdapter {
    fn language(&self) -> &'static str {
        "java"
    }

    fn source_name(&self, content: &[u8]) -> String {
        format!("{}.java", detect_class_name(content))
    }

    fn compile_command(&self, workdir: &Path, sources: &[String], flags: &[String]) -> Option<Vec<String>> {
        let mut command = vec![
            "javac".to_string(),
            "-encoding".to_string(),
            "UTF-8".to_string(),
        ];
        command.extend(flags.iter().cloned());
        command.extend(
            sources
                .iter()
                .filter(|name| name.ends_with(".java"))
                .map(|name| workdir.join(name).to_string_lossy().to_string()),
        );
        Some(command)
    }

    fn run_command(&self, workdir: &Path, sources: &[String]) -> Vec<String> {
        let class_name = sources
            .iter()
            .find_map(|name| name.strip_suffix(".java"))
            .unwrap_or("Main");
        vec![
            "java".to_string(),
            "-Xss64m".to_string(),
            "-XX:+UseSerialGC".to_string(),
            "-cp".to_string(),
            workdir.to_string_lossy().to_string(),
            class_name.to_string(),
        ]
    }

    fn run_env(&self, _unbuffered: bool) -> Vec<(String, String)> {
        vec![("JAVA_TOOL_OPTIONS".to_string(), "-Dfile.encoding=UTF-8".to_string())]
    }

    fn limits_address_space(&self) -> bool {
        false
    }
}
