use crate::error::{LoomError, Result};
use crate::markdown::{headings, split_frontmatter, Heading};
use crate::placeholder::{is_valid_name, placeholders};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Frontmatter accepted on template files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateMeta {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required_headings: Option<Vec<Heading>>,
    #[serde(default)]
    optional_placeholders: Vec<String>,
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A document skeleton: ordered required headings plus a body with placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: Vec<Heading>,
    /// Placeholders allowed to remain unresolved on delivery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional: Vec<String>,
    pub body: String,
}

impl Template {
    /// Template whose required headings are the `##` / `###` headings that
    /// occur exactly once in `body`. Repeated subsections are not part of
    /// the contract.
    pub fn from_body(id: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        let candidates: Vec<Heading> = headings(&body)
            .into_iter()
            .filter(|h| h.level == 2 || h.level == 3)
            .collect();
        let required = candidates
            .iter()
            .filter(|&h| candidates.iter().filter(|&c| c == h).count() == 1)
            .cloned()
            .collect();
        Self {
            id: id.into(),
            description: None,
            required,
            optional: Vec::new(),
            body,
        }
    }

    pub fn with_required(
        id: impl Into<String>,
        required: Vec<Heading>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: None,
            required,
            optional: Vec::new(),
            body: body.into(),
        }
    }

    pub fn parse(rel_id: &str, content: &str, source: Option<&Path>) -> Result<Self> {
        let where_ = || {
            source
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| rel_id.to_string())
        };
        let (fm, body) = split_frontmatter(content);
        let meta: TemplateMeta = match fm {
            Some(fm) if !fm.trim().is_empty() => {
                serde_yaml::from_str(fm).map_err(|e| LoomError::InvalidFrontmatter {
                    path: where_(),
                    reason: e.to_string(),
                })?
            }
            _ => TemplateMeta::default(),
        };

        if let Some(bad) = meta.optional_placeholders.iter().find(|n| !is_valid_name(n)) {
            return Err(LoomError::InvalidFrontmatter {
                path: where_(),
                reason: format!("'{bad}' is not a placeholder name"),
            });
        }

        let mut template = match meta.required_headings {
            Some(required) => Template::with_required(rel_id, required, body),
            None => Template::from_body(rel_id, body),
        };
        if let Some(id) = meta.id {
            template.id = id;
        }
        template.description = meta.description;
        template.optional = meta.optional_placeholders;
        Ok(template)
    }

    /// Distinct placeholder names in the body.
    pub fn declared_placeholders(&self) -> Vec<String> {
        placeholders(&self.body)
    }

    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.iter().any(|o| o == name)
    }
}

// ---------------------------------------------------------------------------
// TemplateSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: BTreeMap<String, Template>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.md` under `dir`; ids are relative paths without extension.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut set = Self::new();
        for path in crate::io::markdown_files(dir)? {
            let content = std::fs::read_to_string(&path)?;
            let rel_id = paths::relative_id(dir, &path);
            let template = Template::parse(&rel_id, &content, Some(&path))?;
            debug!(id = %template.id, required = template.required.len(), "loaded template");
            set.insert(template);
        }
        Ok(set)
    }

    pub fn insert(&mut self, template: Template) -> Option<Template> {
        self.templates.insert(template.id.clone(), template)
    }

    pub fn get(&self, id: &str) -> Result<&Template> {
        self.templates
            .get(id)
            .ok_or_else(|| LoomError::not_found("template", id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
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
    fn required_defaults_to_body_headings() {
        let t = Template::from_body(
            "design",
            "# Design\n## Overview\n[PROJECT_NAME]\n### Data\n#### Deep\n```\n## fenced\n```\n",
        );
        assert_eq!(
            t.required,
            vec![Heading::new(2, "Overview"), Heading::new(3, "Data")]
        );
        assert_eq!(t.declared_placeholders(), vec!["PROJECT_NAME"]);
    }

    #[test]
    fn repeated_body_headings_are_not_required() {
        let t = Template::from_body("t", "## Frontend\n### Notes\n## Backend\n### Notes\n");
        assert_eq!(
            t.required,
            vec![Heading::new(2, "Frontend"), Heading::new(2, "Backend")]
        );
    }

    #[test]
    fn frontmatter_declares_contract() {
        let content = "---\nid: architecture\nrequired_headings:\n  - \"## A\"\n  - \"## B\"\noptional_placeholders: [NOTES]\n---\n## A\n[NOTES]\n";
        let t = Template::parse("docs/arch", content, None).unwrap();
        assert_eq!(t.id, "architecture");
        assert_eq!(t.required, vec![Heading::new(2, "A"), Heading::new(2, "B")]);
        assert!(t.is_optional("NOTES"));
        assert!(!t.is_optional("PROJECT"));
        assert_eq!(t.body, "## A\n[NOTES]\n");
    }

    #[test]
    fn frontmatter_typos_rejected() {
        let content = "---\nrequired_heading: [\"## A\"]\n---\nbody\n";
        assert!(matches!(
            Template::parse("t", content, None),
            Err(LoomError::InvalidFrontmatter { .. })
        ));
        let content = "---\noptional_placeholders: [notes]\n---\nbody\n";
        assert!(Template::parse("t", content, None).is_err());
    }

    #[test]
    fn template_set_lookup() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("roles")).unwrap();
        std::fs::write(dir.path().join("roles/analyst.md"), "## Summary\n").unwrap();
        let set = TemplateSet::open(dir.path()).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get("roles/analyst").is_ok());
        assert!(matches!(
            set.get("roles/missing"),
            Err(LoomError::NotFound { kind: "template", .. })
        ));
    }
}
