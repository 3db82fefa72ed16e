use crate::binding::BindingContext;
use crate::error::{LoomError, Result};
use crate::paths;
use crate::placeholder::is_valid_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Target languages; language-specific fragments outside this set are skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_knowledge")]
    pub knowledge: String,
    #[serde(default = "default_templates")]
    pub templates: String,
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_knowledge() -> String {
    paths::DEFAULT_KNOWLEDGE_DIR.to_string()
}

fn default_templates() -> String {
    paths::DEFAULT_TEMPLATES_DIR.to_string()
}

fn default_output() -> String {
    paths::DEFAULT_OUTPUT_DIR.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            knowledge: default_knowledge(),
            templates: default_templates(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Check `{{ref:KEY}}` cross-references against the registry.
    #[serde(default = "default_check_references")]
    pub check_references: bool,
}

fn default_check_references() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_references: default_check_references(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    /// Project-wide base bindings, applied before role context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        let name = project_name.into();
        let mut bindings = BTreeMap::new();
        bindings.insert("PROJECT_NAME".to_string(), name.clone());
        Self {
            version: 1,
            project: ProjectConfig {
                name,
                description: None,
                languages: Vec::new(),
            },
            paths: PathsConfig::default(),
            bindings,
            validation: ValidationConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LoomError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn knowledge_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.knowledge)
    }

    pub fn templates_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.templates)
    }

    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.paths.output)
    }

    /// `bindings` plus `PROJECT_DESCRIPTION` when a description is set and
    /// not already bound.
    pub fn base_bindings(&self) -> Result<BindingContext> {
        let mut ctx = BindingContext::from_map(&self.bindings)?;
        if let Some(desc) = &self.project.description {
            if !ctx.contains("PROJECT_DESCRIPTION") {
                ctx.bind("PROJECT_DESCRIPTION", desc.clone())?;
            }
        }
        Ok(ctx)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.project.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "project.name is empty".to_string(),
            });
        }

        for name in self.bindings.keys() {
            if !is_valid_name(name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "binding '{name}' is not a placeholder name (expected [A-Z][A-Z0-9_]*)"
                    ),
                });
            }
        }

        for (name, value) in &self.bindings {
            if value.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("binding '{name}' has an empty value"),
                });
            }
        }

        let mut seen: Vec<String> = Vec::new();
        for lang in &self.project.languages {
            let lower = lang.to_lowercase();
            if seen.contains(&lower) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("language '{lang}' listed more than once"),
                });
            } else {
                seen.push(lower);
            }
        }

        let p = &self.paths;
        if p.knowledge == p.output || p.templates == p.output {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "paths.output '{}' overlaps an input directory; delivered documents would be reloaded",
                    p.output
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "test-project");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.paths, PathsConfig::default());
        assert_eq!(parsed.bindings.get("PROJECT_NAME").unwrap(), "test-project");
    }

    #[test]
    fn minimal_yaml_gets_defaults() {
        let cfg: Config = serde_yaml::from_str("project:\n  name: demo\n").unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.paths.knowledge, "knowledge");
        assert_eq!(cfg.paths.output, "out");
        assert!(cfg.validation.check_references);
        assert!(cfg.bindings.is_empty());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(LoomError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("contoso");
        cfg.project.languages = vec!["python".to_string()];
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.languages, vec!["python"]);
        assert_eq!(loaded.knowledge_dir(dir.path()), dir.path().join("knowledge"));
    }

    #[test]
    fn base_bindings_include_description() {
        let mut cfg = Config::new("contoso");
        cfg.project.description = Some("Order intake prototype".to_string());
        let ctx = cfg.base_bindings().unwrap();
        assert_eq!(ctx.get("PROJECT_NAME"), Some("contoso"));
        assert_eq!(ctx.get("PROJECT_DESCRIPTION"), Some("Order intake prototype"));

        cfg.bindings.insert("lower".to_string(), "x".to_string());
        assert!(matches!(
            cfg.base_bindings(),
            Err(LoomError::InvalidName { .. })
        ));
    }

    #[test]
    fn validate_flags_problems() {
        let mut cfg = Config::new("contoso");
        cfg.bindings.insert("bad-name".to_string(), "x".to_string());
        cfg.bindings.insert("EMPTY".to_string(), " ".to_string());
        cfg.project.languages = vec!["Python".to_string(), "python".to_string()];
        cfg.paths.output = "knowledge".to_string();

        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 4);
        assert_eq!(
            warnings
                .iter()
                .filter(|w| w.level == WarnLevel::Error)
                .count(),
            1
        );
        assert!(warnings.iter().any(|w| w.message.contains("bad-name")));
        assert!(warnings.iter().any(|w| w.message.contains("more than once")));
    }
}
