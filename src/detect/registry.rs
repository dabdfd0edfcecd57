use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::ModelRuntime;
use super::detector::Detector;
use super::DetectError;

/// Named model runtimes.
///
/// Runtimes are wrapped in `Mutex` because `ModelRuntime::infer` takes `&mut self`.
pub struct RuntimeRegistry {
    runtimes: HashMap<String, Arc<Mutex<dyn ModelRuntime>>>,
    default_name: Option<String>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            runtimes: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a runtime. The first registered runtime becomes the default.
    pub fn register<R: ModelRuntime + 'static>(&mut self, runtime: R) {
        let name = runtime.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.runtimes.insert(name, Arc::new(Mutex::new(runtime)));
    }

    /// Make a registered runtime the default.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.runtimes.contains_key(name) {
            return Err(anyhow!("runtime '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn ModelRuntime>>> {
        self.runtimes.get(name).cloned()
    }

    pub fn default_runtime(&self) -> Option<Arc<Mutex<dyn ModelRuntime>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered runtime names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runtimes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Warm up the named runtime (or the default) and wrap it in a detector.
    pub fn detector(&self, name: Option<&str>) -> std::result::Result<Detector, DetectError> {
        let runtime = match name {
            Some(name) => self.get(name),
            None => self.default_runtime(),
        }
        .ok_or_else(|| {
            DetectError::ModelUnavailable(format!(
                "runtime '{}' not registered (have: {})",
                name.unwrap_or("<default>"),
                self.list().join(", ")
            ))
        })?;

        {
            let mut guard = runtime
                .lock()
                .map_err(|_| DetectError::ModelUnavailable("runtime lock poisoned".to_string()))?;
            guard
                .warm_up()
                .map_err(|e| DetectError::ModelUnavailable(format!("{}: {:#}", guard.name(), e)))?;
        }
        Ok(Detector::new(runtime))
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubRuntime;

    #[test]
    fn first_registered_runtime_is_default() -> Result<()> {
        let mut registry = RuntimeRegistry::new();
        registry.register(StubRuntime::demo());
        assert_eq!(registry.list(), vec!["stub".to_string()]);
        assert!(registry.default_runtime().is_some());
        registry.detector(None)?;
        Ok(())
    }

    #[test]
    fn unknown_runtime_is_model_unavailable() {
        let mut registry = RuntimeRegistry::new();
        registry.register(StubRuntime::demo());
        assert!(registry.set_default("tract").is_err());
        assert!(matches!(
            registry.detector(Some("tract")),
            Err(DetectError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn set_default_selects_runtime() -> Result<()> {
        let mut registry = RuntimeRegistry::new();
        registry.register(StubRuntime::demo());
        registry.register(NamedStub);
        registry.set_default("other")?;
        let runtime = registry.default_runtime().ok_or_else(|| anyhow!("no default"))?;
        let name = runtime.lock().map_err(|_| anyhow!("poisoned"))?.name();
        assert_eq!(name, "other");
        registry.detector(None)?;
        Ok(())
    }

    struct NamedStub;

    impl ModelRuntime for NamedStub {
        fn name(&self) -> &'static str {
            "other"
        }

        fn infer(
            &mut self,
            _frame: &crate::frame::FrameView<'_>,
        ) -> Result<Vec<crate::detect::Observation>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn empty_registry_has_no_detector() {
        let registry = RuntimeRegistry::default();
        assert!(registry.detector(None).is_err());
    }
}
