use std::path::Path;

/// Language adapter contract for compile and run commands.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> &'static str;

    /// Conventional file name for a main source with this content.
    fn source_name(&self, content: &[u8]) -> String;

    /// Compile command run inside `workdir`, or none for interpreted languages.
    fn compile_command(&self, workdir: &Path, sources: &[String], flags: &[String]) -> Option<Vec<String>>;

    fn run_command(&self, workdir: &Path, sources: &[String]) -> Vec<String>;

    fn run_env(&self, _unbuffered: bool) -> Vec<(String, String)> {
        Vec::new()
    }

    fn limits_address_space(&self) -> bool {
        true
    }
}
