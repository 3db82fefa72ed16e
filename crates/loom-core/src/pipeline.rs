//! Drives roles through compose → validate, one dependency wave at a time.

use crate::binding::BindingContext;
use crate::compose::merge;
use crate::config::Config;
use crate::context::{RoleContextBuilder, Upstream};
use crate::document::ComposedDocument;
use crate::error::{LoomError, Result};
use crate::fragment::{Fragment, FragmentStore};
use crate::registry::Registry;
use crate::role::RoleGraph;
use crate::template::TemplateSet;
use crate::validate::Validator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Settings and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Project languages used to narrow language-specific fragments.
    pub languages: Vec<String>,
    pub base: BindingContext,
    pub check_references: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            languages: config.project.languages.clone(),
            base: config.base_bindings()?,
            check_references: config.validation.check_references,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Validated,
    Rejected { kind: String, message: String },
    /// No document was produced (context, template or fragment lookup failed).
    Failed { kind: String, message: String },
    Skipped { blocked_by: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

impl StageReport {
    pub fn from_document(role: &str, doc: &ComposedDocument) -> Self {
        let outcome = match &doc.rejection {
            Some(r) => StageOutcome::Rejected {
                kind: r.kind.clone(),
                message: r.message.clone(),
            },
            None => StageOutcome::Validated,
        };
        Self {
            role: role.to_string(),
            document_id: Some(doc.id),
            outcome,
        }
    }

    pub fn failed(role: &str, err: &LoomError) -> Self {
        Self {
            role: role.to_string(),
            document_id: None,
            outcome: StageOutcome::Failed {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }

    fn skipped(role: &str, blocked_by: &str) -> Self {
        Self {
            role: role.to_string(),
            document_id: None,
            outcome: StageOutcome::Skipped {
                blocked_by: blocked_by.to_string(),
            },
        }
    }

    pub fn is_validated(&self) -> bool {
        self.outcome == StageOutcome::Validated
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    store: &'a FragmentStore,
    templates: &'a TemplateSet,
    roles: &'a RoleGraph,
    registry: &'a Registry,
    settings: PipelineSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        store: &'a FragmentStore,
        templates: &'a TemplateSet,
        roles: &'a RoleGraph,
        registry: &'a Registry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            templates,
            roles,
            registry,
            settings,
        }
    }

    pub fn roles(&self) -> &RoleGraph {
        self.roles
    }

    /// Fragments for every topic the role asks for, deduplicated by id.
    fn fragments_for(&self, topics: &[String]) -> Result<Vec<&'a Fragment>> {
        let store: &'a FragmentStore = self.store;
        let mut out: Vec<&'a Fragment> = Vec::new();
        for topic in topics {
            for f in store.find_for(topic, &self.settings.languages)? {
                if !out.iter().any(|o| o.id == f.id) {
                    out.push(f);
                }
            }
        }
        Ok(out)
    }

    /// Run one role against `upstream`.
    ///
    /// Returns the new document in `Validated` or `Rejected`. Errors before a
    /// document exists (unsatisfied dependencies, unknown template or topic)
    /// are returned as `Err`.
    pub fn run_stage(&self, role: &str, upstream: &Upstream) -> Result<ComposedDocument> {
        let def = self.roles.get(role)?;
        let ctx = RoleContextBuilder::new(self.roles).build_context(
            role,
            upstream,
            &self.settings.base,
        )?;
        let template = self.templates.get(&def.template)?;
        let fragments = self.fragments_for(&def.fragments)?;

        let mut doc = merge(template, &fragments, &ctx)?;
        doc.role = Some(role.to_string());

        if let Some(heading) = doc.missing_sections.first() {
            let err = LoomError::MissingSection {
                template: template.id.clone(),
                heading: heading.to_string(),
            };
            warn!(role, error = %err, "stage rejected");
            doc.reject(&err)?;
            return Ok(doc);
        }

        let validator = if self.settings.check_references {
            Validator::new(self.registry)
        } else {
            Validator::without_registry()
        };
        match validator.validate(&doc, template).into_result(&template.id) {
            Ok(()) => {
                doc.mark_validated()?;
                info!(role, document = %doc.id, "stage validated");
            }
            Err(err) => {
                warn!(role, error = %err, "stage rejected");
                doc.reject(&err)?;
            }
        }
        Ok(doc)
    }

    /// Run every role, wave by wave. Roles within a wave run in parallel.
    ///
    /// Each produced document replaces the role's entry in `upstream`. A role
    /// whose dependency did not validate is skipped.
    pub fn run_all(&self, upstream: &mut Upstream) -> Vec<StageReport> {
        let mut reports = Vec::new();
        let mut ran: Vec<String> = Vec::new();

        for wave in self.roles.waves() {
            let mut runnable: Vec<&str> = Vec::new();
            for def in wave {
                match self.blocker(&def.name, upstream, &ran) {
                    Some(dep) => {
                        info!(role = %def.name, blocked_by = %dep, "stage skipped");
                        upstream.remove(&def.name);
                        reports.push(StageReport::skipped(&def.name, &dep));
                    }
                    None => runnable.push(def.name.as_str()),
                }
            }

            let shared: &Upstream = upstream;
            let results: Vec<(&str, Result<ComposedDocument>)> = runnable
                .par_iter()
                .map(|role| (*role, self.run_stage(role, shared)))
                .collect();

            for (role, result) in results {
                ran.push(role.to_string());
                match result {
                    Ok(doc) => {
                        reports.push(StageReport::from_document(role, &doc));
                        upstream.insert(role.to_string(), doc);
                    }
                    Err(err) => {
                        warn!(role, error = %err, "stage failed");
                        reports.push(StageReport::failed(role, &err));
                        upstream.remove(role);
                    }
                }
            }
        }
        reports
    }

    /// First direct dependency that did not produce a usable document this run.
    fn blocker(&self, role: &str, upstream: &Upstream, ran: &[String]) -> Option<String> {
        let def = self.roles.get(role).ok()?;
        def.depends_on
            .iter()
            .find(|dep| {
                !ran.contains(dep)
                    || !upstream.get(*dep).is_some_and(ComposedDocument::satisfies_dependency)
            })
            .cloned()
    }

    /// `Validated` → `Delivered`.
    pub fn deliver(&self, doc: &mut ComposedDocument) -> Result<()> {
        doc.deliver()?;
        info!(role = ?doc.role, document = %doc.id, "delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
