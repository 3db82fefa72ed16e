//! Role definitions and the dependency DAG between them.
//!
//! An edge `A -> B` means B depends on A: A's validated output is part of
//! B's context. Ordering uses Kahn's algorithm with ties broken by name so
//! that `loom role order` is stable across runs.

use crate::error::{LoomError, Result};
use crate::markdown::Heading;
use crate::paths::validate_role_name;
use crate::placeholder::is_valid_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use tracing::debug;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Bind the body of an upstream section to a placeholder name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Extraction {
    pub from: String,
    pub section: Heading,
    pub bind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub template: String,
    /// Fragment topics injected into this role's document.
    #[serde(default)]
    pub fragments: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extract: Vec<Extraction>,
}

impl RoleDefinition {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            template: template.into(),
            fragments: Vec::new(),
            depends_on: Vec::new(),
            extract: Vec::new(),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn after(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_fragments(mut self, topics: &[&str]) -> Self {
        self.fragments = topics.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn extracting(mut self, from: &str, section: Heading, bind: &str) -> Self {
        self.extract.push(Extraction {
            from: from.to_string(),
            section,
            bind: bind.to_string(),
        });
        self
    }

    /// `<ROLE>_OUTPUT` binding name for this role's full text.
    pub fn output_binding(&self) -> String {
        output_binding(&self.name)
    }
}

pub fn output_binding(role: &str) -> String {
    format!("{}_OUTPUT", role.to_uppercase().replace('-', "_"))
}

/// On-disk shape of `.loom/roles.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolesFile {
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
}

// ---------------------------------------------------------------------------
// RoleGraph
// ---------------------------------------------------------------------------

/// A validated, acyclic set of role definitions.
#[derive(Debug, Clone)]
pub struct RoleGraph {
    roles: BTreeMap<String, RoleDefinition>,
    /// `role -> roles that depend on it`
    downstream: BTreeMap<String, BTreeSet<String>>,
}

impl RoleGraph {
    pub fn from_definitions(defs: Vec<RoleDefinition>) -> Result<Self> {
        let mut roles: BTreeMap<String, RoleDefinition> = BTreeMap::new();
        for def in defs {
            validate_role_name(&def.name)?;
            if roles.contains_key(&def.name) {
                return Err(LoomError::InvalidRole {
                    role: def.name.clone(),
                    reason: "defined more than once".to_string(),
                });
            }
            roles.insert(def.name.clone(), def);
        }

        let mut downstream: BTreeMap<String, BTreeSet<String>> =
            roles.keys().map(|k| (k.clone(), BTreeSet::new())).collect();
        for def in roles.values() {
            for dep in &def.depends_on {
                let Some(set) = downstream.get_mut(dep) else {
                    return Err(LoomError::not_found("role", dep.clone()));
                };
                set.insert(def.name.clone());
            }
        }

        let graph = Self { roles, downstream };
        if let Some(cycle) = graph.find_cycle() {
            return Err(LoomError::CyclicDependency { roles: cycle });
        }
        graph.check_extractions()?;
        debug!(roles = graph.roles.len(), "role graph loaded");
        Ok(graph)
    }

    /// Load `roles:` from YAML.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoomError::not_found("roles file", path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let file: RolesFile = serde_yaml::from_str(&data)?;
        Self::from_definitions(file.roles)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = RolesFile {
            roles: self.definitions().cloned().collect(),
        };
        let data = serde_yaml::to_string(&file)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// analyst → architect → infrastructure → developer → {security, qa}
    pub fn default_pipeline() -> Self {
        let defs = vec![
            RoleDefinition::new("analyst", "roles/analyst")
                .describe("Captures requirements and the business problem"),
            RoleDefinition::new("architect", "roles/architect")
                .describe("Chooses services and the solution shape")
                .after(&["analyst"])
                .with_fragments(&["service-patterns"]),
            RoleDefinition::new("infrastructure", "roles/infrastructure")
                .describe("Defines infrastructure as code for the chosen services")
                .after(&["architect"])
                .with_fragments(&["iac"])
                .extracting("architect", Heading::new(2, "Services"), "SERVICES"),
            RoleDefinition::new("developer", "roles/developer")
                .describe("Implements application code against the infrastructure")
                .after(&["architect", "infrastructure"])
                .with_fragments(&["auth"])
                .extracting("architect", Heading::new(2, "Services"), "SERVICES")
                .extracting("infrastructure", Heading::new(2, "Resources"), "RESOURCES"),
            RoleDefinition::new("security", "roles/security")
                .describe("Reviews identity, secrets and access")
                .after(&["developer"])
                .with_fragments(&["governance"])
                .extracting("architect", Heading::new(2, "RBAC Roles"), "RBAC_ROLES"),
            RoleDefinition::new("qa", "roles/qa")
                .describe("Plans tests for the delivered prototype")
                .after(&["developer"]),
        ];
        match Self::from_definitions(defs) {
            Ok(g) => g,
            Err(e) => unreachable!("default pipeline invalid: {e}"),
        }
    }

    pub fn get(&self, role: &str) -> Result<&RoleDefinition> {
        self.roles
            .get(role)
            .ok_or_else(|| LoomError::not_found("role", role))
    }

    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.values()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Roles with every dependency ahead of its dependents.
    pub fn topological_order(&self) -> Vec<&RoleDefinition> {
        self.waves().into_iter().flatten().collect()
    }

    /// Roles grouped by dependency depth. Roles in one wave are independent.
    pub fn waves(&self) -> Vec<Vec<&RoleDefinition>> {
        let mut in_degree: BTreeMap<&str, usize> =
            self.roles.keys().map(|k| (k.as_str(), 0)).collect();
        for dependents in self.downstream.values() {
            for d in dependents {
                *in_degree.entry(d.as_str()).or_default() += 1;
            }
        }

        let mut current: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&name, _)| name)
            .collect();
        let mut waves = Vec::new();

        while !current.is_empty() {
            let mut next: BTreeSet<&str> = BTreeSet::new();
            for name in &current {
                for dependent in &self.downstream[*name] {
                    if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                        *deg -= 1;
                        if *deg == 0 {
                            next.insert(dependent.as_str());
                        }
                    }
                }
            }
            waves.push(current.iter().map(|n| &self.roles[*n]).collect());
            current = next.into_iter().collect();
        }
        waves
    }

    /// Transitive dependencies of `role`, in topological order.
    pub fn ancestors(&self, role: &str) -> Result<Vec<&RoleDefinition>> {
        self.get(role)?;
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([role]);
        while let Some(name) = queue.pop_front() {
            for dep in &self.roles[name].depends_on {
                if seen.insert(dep.as_str()) {
                    queue.push_back(dep.as_str());
                }
            }
        }
        Ok(self
            .topological_order()
            .into_iter()
            .filter(|d| seen.contains(d.name.as_str()))
            .collect())
    }

    /// DFS for a back edge; returns the cycle as `a -> b -> a`.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a RoleGraph,
            name: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(name) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(name.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            stack.push(name);
            for next in &graph.downstream[name] {
                if let Some(cycle) = visit(graph, next, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        for name in self.roles.keys() {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(self, name, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn check_extractions(&self) -> Result<()> {
        for def in self.roles.values() {
            if def.extract.is_empty() {
                continue;
            }
            let ancestors: BTreeSet<&str> = self
                .ancestors(&def.name)?
                .into_iter()
                .map(|d| d.name.as_str())
                .collect();
            for x in &def.extract {
                if !ancestors.contains(x.from.as_str()) {
                    return Err(LoomError::InvalidRole {
                        role: def.name.clone(),
                        reason: format!("extracts from '{}', which is not a dependency", x.from),
                    });
                }
                if !is_valid_name(&x.bind) {
                    return Err(LoomError::InvalidRole {
                        role: def.name.clone(),
                        reason: format!("'{}' is not a valid placeholder name", x.bind),
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(defs: &[&RoleDefinition]) -> Vec<String> {
        defs.iter().map(|d| d.name.clone()).collect()
    }

    #[test]
    fn default_pipeline_order() {
        let g = RoleGraph::default_pipeline();
        assert_eq!(
            names(&g.topological_order()),
            vec!["analyst", "architect", "infrastructure", "developer", "qa", "security"]
        );
        let waves: Vec<Vec<String>> = g.waves().iter().map(|w| names(w)).collect();
        assert_eq!(waves.len(), 5);
        assert_eq!(waves[4], vec!["qa", "security"]);
    }

    #[test]
    fn ancestors_in_topological_order() {
        let g = RoleGraph::default_pipeline();
        assert_eq!(
            names(&g.ancestors("developer").unwrap()),
            vec!["analyst", "architect", "infrastructure"]
        );
        assert!(g.ancestors("analyst").unwrap().is_empty());
        assert!(matches!(g.ancestors("nope"), Err(LoomError::NotFound { .. })));
    }

    #[test]
    fn cycle_is_rejected_with_path() {
        let defs = vec![
            RoleDefinition::new("a", "t").after(&["c"]),
            RoleDefinition::new("b", "t").after(&["a"]),
            RoleDefinition::new("c", "t").after(&["b"]),
        ];
        match RoleGraph::from_definitions(defs) {
            Err(LoomError::CyclicDependency { roles }) => {
                assert_eq!(roles.first(), roles.last());
                assert_eq!(roles.len(), 4);
                for r in ["a", "b", "c"] {
                    assert!(roles.iter().any(|x| x == r));
                }
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let defs = vec![RoleDefinition::new("a", "t").after(&["a"])];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn unknown_dependency_and_duplicates() {
        let defs = vec![RoleDefinition::new("a", "t").after(&["ghost"])];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::NotFound { kind: "role", .. })
        ));

        let defs = vec![RoleDefinition::new("a", "t"), RoleDefinition::new("a", "u")];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::InvalidRole { .. })
        ));

        let defs = vec![RoleDefinition::new("Bad Name", "t")];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::InvalidName { .. })
        ));
    }

    #[test]
    fn role_names_must_yield_output_placeholders() {
        let defs = vec![
            RoleDefinition::new("1st", "t"),
            RoleDefinition::new("second", "t").after(&["1st"]),
        ];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::InvalidName { kind: "role", .. })
        ));
    }

    #[test]
    fn extraction_must_come_from_an_ancestor() {
        let defs = vec![
            RoleDefinition::new("a", "t"),
            RoleDefinition::new("b", "t").extracting("a", Heading::new(2, "X"), "X"),
        ];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::InvalidRole { .. })
        ));

        let defs = vec![
            RoleDefinition::new("a", "t"),
            RoleDefinition::new("b", "t")
                .after(&["a"])
                .extracting("a", Heading::new(2, "X"), "lower"),
        ];
        assert!(matches!(
            RoleGraph::from_definitions(defs),
            Err(LoomError::InvalidRole { .. })
        ));
    }

    #[test]
    fn yaml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.yaml");
        let g = RoleGraph::default_pipeline();
        g.save(&path).unwrap();
        let loaded = RoleGraph::load(&path).unwrap();
        assert_eq!(loaded.len(), g.len());
        let infra = loaded.get("infrastructure").unwrap();
        assert_eq!(infra.extract[0].section, Heading::new(2, "Services"));
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roles.yaml");
        std::fs::write(&path, "roles:\n  - name: a\n    template: t\n    dependson: [b]\n").unwrap();
        assert!(matches!(RoleGraph::load(&path), Err(LoomError::Yaml(_))));
    }

    #[test]
    fn output_binding_names() {
        assert_eq!(output_binding("analyst"), "ANALYST_OUTPUT");
        assert_eq!(output_binding("data-eng"), "DATA_ENG_OUTPUT");
    }
}
