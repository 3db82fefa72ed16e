//! Role Context Builder: derive a role's bindings from upstream outputs.

use crate::binding::BindingContext;
use crate::document::ComposedDocument;
use crate::error::{LoomError, Result};
use crate::markdown::section;
use crate::role::{output_binding, RoleGraph};
use std::collections::BTreeMap;
use tracing::debug;

/// Upstream documents keyed by role name.
pub type Upstream = BTreeMap<String, ComposedDocument>;

pub struct RoleContextBuilder<'a> {
    roles: &'a RoleGraph,
}

impl<'a> RoleContextBuilder<'a> {
    pub fn new(roles: &'a RoleGraph) -> Self {
        Self { roles }
    }

    /// Bindings for `role`: `base` first, then `ROLE`, then every transitive
    /// dependency's `<DEP>_OUTPUT` and extracted sections.
    ///
    /// Every dependency must have a `Validated` or `Delivered` document in
    /// `upstream`.
    pub fn build_context(
        &self,
        role: &str,
        upstream: &Upstream,
        base: &BindingContext,
    ) -> Result<BindingContext> {
        let def = self.roles.get(role)?;
        let ancestors = self.roles.ancestors(role)?;

        let mut ctx = base.clone();
        ctx.bind("ROLE", def.name.clone())?;

        for dep in &ancestors {
            let doc = upstream.get(&dep.name).ok_or_else(|| LoomError::DependencyNotSatisfied {
                role: role.to_string(),
                reason: format!("'{}' has not produced a document", dep.name),
            })?;
            if !doc.satisfies_dependency() {
                return Err(LoomError::DependencyNotSatisfied {
                    role: role.to_string(),
                    reason: format!("'{}' is {}", dep.name, doc.state),
                });
            }
            ctx.bind(output_binding(&dep.name), doc.text.clone())?;
        }

        for x in &def.extract {
            // Extraction sources are ancestors, checked when the graph loaded.
            let Some(doc) = upstream.get(&x.from) else {
                continue;
            };
            let body = section(&doc.text, &x.section).ok_or_else(|| {
                LoomError::DependencyNotSatisfied {
                    role: role.to_string(),
                    reason: format!("'{}' output has no section '{}'", x.from, x.section),
                }
            })?;
            ctx.bind(x.bind.clone(), body)?;
        }

        debug!(role, bindings = ctx.len(), "context built");
        Ok(ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
