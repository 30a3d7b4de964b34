use crate::checkers::builtin::{IdenticalChecker, StandardChecker};
use crate::checkers::Checker;
use crate::config::types::{GraderError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Name-to-checker mapping built once at startup and handed to the problem loader.
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StandardChecker));
        registry.register(Arc::new(IdenticalChecker));
        registry
    }

    /// Register a checker under its own name, replacing any previous entry.
    pub fn register(&mut self, checker: Arc<dyn Checker>) {
        self.checkers.insert(checker.name().to_string(), checker);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Checker>> {
        self.checkers
            .get(name)
            .cloned()
            .ok_or_else(|| GraderError::Config(format!("unknown checker: {name}")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.checkers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_checkers_registered() {
        let registry = CheckerRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["identical", "standard"]);
        assert_eq!(registry.get("standard").map(|c| c.name().to_string()).ok(), Some("standard".into()));
    }

    #[test]
    fn test_unknown_checker_is_config_error() {
        let registry = CheckerRegistry::with_builtin();
        assert!(matches!(registry.get("floats"), Err(GraderError::Config(_))));
    }
}
