//! Canonical registry that `{{ref:KEY}}` cross-references resolve against.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from YAML. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let registry: Registry = serde_yaml::from_str(&data)?;
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn insert(&mut self, key: impl Into<String>, name: impl Into<String>) {
        self.entries.insert(
            key.into(),
            RegistryEntry {
                name: name.into(),
                description: None,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&RegistryEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Starter registry of common Azure services written by `loom init`.
    pub fn starter() -> Self {
        let mut r = Self::new();
        r.insert("app-service", "Azure App Service");
        r.insert("container-apps", "Azure Container Apps");
        r.insert("functions", "Azure Functions");
        r.insert("key-vault", "Azure Key Vault");
        r.insert("cosmos-db", "Azure Cosmos DB");
        r.insert("sql-database", "Azure SQL Database");
        r.insert("storage-account", "Azure Storage Account");
        r.insert("app-insights", "Application Insights");
        r
    }
}

static REF_RE: OnceLock<Regex> = OnceLock::new();

fn ref_re() -> &'static Regex {
    REF_RE.get_or_init(|| Regex::new(r"\{\{\s*ref:\s*([A-Za-z0-9][A-Za-z0-9._/\-]*)\s*\}\}").unwrap())
}

/// Distinct `{{ref:KEY}}` keys in `text`, in order of first appearance.
pub fn references(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in ref_re().captures_iter(text) {
        let key = &caps[1];
        if !out.iter().any(|k| k == key) {
            out.push(key.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reference_scanning() {
        let text = "Use {{ref:key-vault}} and {{ ref: app-service }} and {{ref:key-vault}}. {{other}}";
        assert_eq!(references(text), vec!["key-vault", "app-service"]);
    }

    #[test]
    fn registry_roundtrip_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.yaml");
        assert!(Registry::load(&path).unwrap().is_empty());

        let r = Registry::starter();
        r.save(&path).unwrap();
        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded, r);
        assert!(loaded.contains("key-vault"));
        assert_eq!(loaded.get("cosmos-db").unwrap().name, "Azure Cosmos DB");
    }

    #[test]
    fn yaml_shape() {
        let yaml = "entries:\n  redis:\n    name: Azure Cache for Redis\n    description: cache\n";
        let r: Registry = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.get("redis").unwrap().description.as_deref(), Some("cache"));
    }
}
