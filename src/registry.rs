use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Chat destinations registered for the daily push, persisted as
/// `registry.json` (a plain JSON array of host destination ids).
pub struct Registry {
    path: PathBuf,
    destinations: Mutex<Vec<String>>,
}

impl Registry {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("registry.json");
        let destinations = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(dests) => dests,
                Err(e) => {
                    tracing::error!(
                        "Corrupt registry file {}, starting empty: {e}",
                        path.display()
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            destinations: Mutex::new(destinations),
        }
    }

    /// Returns false when the destination was already registered.
    pub fn register(&self, dest: &str) -> Result<bool> {
        let mut dests = self.destinations.lock().expect("registry lock poisoned");
        if dests.iter().any(|d| d == dest) {
            return Ok(false);
        }
        dests.push(dest.to_string());
        self.save(&dests)?;
        Ok(true)
    }

    /// Returns false when the destination was not registered.
    pub fn unregister(&self, dest: &str) -> Result<bool> {
        let mut dests = self.destinations.lock().expect("registry lock poisoned");
        let before = dests.len();
        dests.retain(|d| d != dest);
        if dests.len() == before {
            return Ok(false);
        }
        self.save(&dests)?;
        Ok(true)
    }

    pub fn contains(&self, dest: &str) -> bool {
        self.destinations
            .lock()
            .expect("registry lock poisoned")
            .iter()
            .any(|d| d == dest)
    }

    pub fn all(&self) -> Vec<String> {
        self.destinations
            .lock()
            .expect("registry lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.destinations
            .lock()
            .expect("registry lock poisoned")
            .len()
    }

    fn save(&self, dests: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(dests)?;
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write registry: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace registry: {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load(dir.path());

        assert!(registry.register("group:123").unwrap());
        assert!(!registry.register("group:123").unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load(dir.path());

        registry.register("group:123").unwrap();
        assert!(registry.unregister("group:123").unwrap());
        assert!(!registry.unregister("group:123").unwrap());
        assert!(!registry.contains("group:123"));
    }

    #[test]
    fn test_registry_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let registry = Registry::load(dir.path());
            registry.register("group:1").unwrap();
            registry.register("user:2").unwrap();
        }
        let registry = Registry::load(dir.path());
        assert_eq!(registry.all(), vec!["group:1".to_string(), "user:2".to_string()]);
    }

    #[test]
    fn test_corrupt_registry_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("registry.json"), "oops").unwrap();
        let registry = Registry::load(dir.path());
        assert_eq!(registry.len(), 0);
    }
}
