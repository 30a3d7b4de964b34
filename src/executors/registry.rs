use crate::executors::adapter::LanguageAdapter;
use crate::executors::languages::{cpp::CppAdapter, java::JavaAdapter, python::PythonAdapter};

pub fn adapter_for(language: &str) -> Option<Box<dyn LanguageAdapter>> {
    match language {
        "python" | "py" | "python3" => Some(Box::new(PythonAdapter)),
        "cpp" | "c++" | "cxx" | "cc" => Some(Box::new(CppAdapter)),
        "java" => Some(Box::new(JavaAdapter)),
        _ => None,
    }
}
