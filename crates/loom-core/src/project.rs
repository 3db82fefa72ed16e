//! Everything loaded from a project root, shared read-only by the pipeline.

use crate::config::Config;
use crate::error::Result;
use crate::fragment::FragmentStore;
use crate::paths;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::registry::Registry;
use crate::role::RoleGraph;
use crate::template::TemplateSet;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub store: FragmentStore,
    pub templates: TemplateSet,
    pub roles: RoleGraph,
    pub registry: Registry,
}

impl Project {
    /// Load config, knowledge, templates, roles and registry.
    ///
    /// A cyclic role set fails here, before any stage can run. Without a
    /// roles file the default pipeline is used.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let store = FragmentStore::open(config.knowledge_dir(root))?;
        let templates = TemplateSet::open(&config.templates_dir(root))?;

        let roles_path = paths::roles_path(root);
        let roles = if roles_path.exists() {
            RoleGraph::load(&roles_path)?
        } else {
            debug!("no roles file, using default pipeline");
            RoleGraph::default_pipeline()
        };
        let registry = Registry::load(&paths::registry_path(root))?;

        debug!(
            fragments = store.len(),
            templates = templates.len(),
            roles = roles.len(),
            registry = registry.len(),
            "project loaded"
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
            templates,
            roles,
            registry,
        })
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.output_dir(&self.root)
    }

    pub fn pipeline(&self) -> Result<Pipeline<'_>> {
        Ok(Pipeline::new(
            &self.store,
            &self.templates,
            &self.roles,
            &self.registry,
            PipelineSettings::from_config(&self.config)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoomError;
    use crate::role::RoleDefinition;
    use tempfile::TempDir;

    fn scaffold(dir: &Path) {
        Config::new("demo").save(dir).unwrap();
        let k = dir.join("knowledge/services");
        std::fs::create_dir_all(&k).unwrap();
        std::fs::write(k.join("key-vault.md"), "Keep secrets in {{ref:key-vault}}.\n").unwrap();
        let t = dir.join("templates/roles");
        std::fs::create_dir_all(&t).unwrap();
        std::fs::write(t.join("analyst.md"), "# [PROJECT_NAME]\n\n## Requirements\n").unwrap();
    }

    #[test]
    fn open_loads_everything() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());
        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.store.len(), 1);
        assert!(project.templates.get("roles/analyst").is_ok());
        assert_eq!(project.roles.len(), RoleGraph::default_pipeline().len());
        assert!(project.registry.is_empty());
        assert_eq!(project.output_dir(), dir.path().join("out"));
    }

    #[test]
    fn open_uninitialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Project::open(dir.path()),
            Err(LoomError::NotInitialized)
        ));
    }

    #[test]
    fn cyclic_roles_abort_open() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());
        let yaml = serde_yaml::to_string(&crate::role::RolesFile {
            roles: vec![
                RoleDefinition::new("a", "roles/analyst").after(&["b"]),
                RoleDefinition::new("b", "roles/analyst").after(&["a"]),
            ],
        })
        .unwrap();
        std::fs::write(paths::roles_path(dir.path()), yaml).unwrap();
        assert!(matches!(
            Project::open(dir.path()),
            Err(LoomError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn analyst_stage_runs_from_disk() {
        let dir = TempDir::new().unwrap();
        scaffold(dir.path());
        let project = Project::open(dir.path()).unwrap();
        let doc = project
            .pipeline()
            .unwrap()
            .run_stage("analyst", &Default::default())
            .unwrap();
        assert!(doc.satisfies_dependency(), "{:?}", doc.rejection);
        assert!(doc.text.starts_with("# demo\n"));
    }
}
