//! Template Composer: template body + fragments + bindings → [`ComposedDocument`].

use crate::binding::BindingContext;
use crate::document::ComposedDocument;
use crate::error::{LoomError, Result};
use crate::fragment::Fragment;
use crate::markdown::{headings, opens_with_heading};
use crate::placeholder::{placeholders, resolve};
use crate::template::Template;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

static MARKER_RE: OnceLock<Regex> = OnceLock::new();

/// `<!-- fragment:KEY -->`, where KEY is a fragment id or topic.
fn marker_re() -> &'static Regex {
    MARKER_RE.get_or_init(|| Regex::new(r"<!--\s*fragment:\s*([^\s>]+)\s*-->").unwrap())
}

/// Fragment text placed at an insertion marker.
fn inline_block(f: &Fragment) -> String {
    match &f.heading {
        Some(h) => format!("{h}\n\n{}", f.body.trim_end()),
        None => f.body.trim_end().to_string(),
    }
}

/// Fragment text appended after the template body, always under some heading.
fn appended_block(f: &Fragment) -> String {
    if f.heading.is_some() || opens_with_heading(&f.body) {
        inline_block(f)
    } else {
        format!("## {}\n\n{}", f.display_title(), f.body.trim_end())
    }
}

/// Merge without enforcing the heading contract.
///
/// The result is always in `Composed`; required headings that are still
/// absent are listed in `missing_sections` for the caller to act on.
pub fn merge(
    template: &Template,
    fragments: &[&Fragment],
    bindings: &BindingContext,
) -> Result<ComposedDocument> {
    let mut placed: HashSet<&str> = HashSet::new();

    let body = marker_re().replace_all(&template.body, |caps: &Captures| {
        let key = &caps[1];
        let mut blocks = Vec::new();
        for f in fragments {
            if placed.contains(f.id.as_str()) || (f.id != key && f.topic != key) {
                continue;
            }
            placed.insert(f.id.as_str());
            blocks.push(inline_block(f));
        }
        blocks.join("\n\n")
    });

    let mut merged = body.into_owned();
    for f in fragments.iter().filter(|f| !placed.contains(f.id.as_str())) {
        if !merged.is_empty() && !merged.ends_with('\n') {
            merged.push('\n');
        }
        if !merged.is_empty() {
            merged.push('\n');
        }
        merged.push_str(&appended_block(f));
        merged.push('\n');
    }

    let declared = placeholders(&merged);
    let undeclared = bindings.undeclared(&declared);
    if !undeclared.is_empty() {
        debug!(template = %template.id, names = ?undeclared, "bindings not used by any placeholder");
    }

    let resolution = resolve(&merged, bindings);
    let present = headings(&resolution.text);
    let missing_sections = template
        .required
        .iter()
        .filter(|h| !present.contains(h))
        .cloned()
        .collect();

    let mut doc = ComposedDocument::draft(template.id.clone(), None);
    doc.text = resolution.text;
    doc.unresolved = resolution.unresolved;
    doc.headings = present;
    doc.missing_sections = missing_sections;
    doc.fragments = fragments.iter().map(|f| f.id.clone()).collect();
    doc.mark_composed()?;
    Ok(doc)
}

/// Merge and require every heading the template declares.
///
/// Fails with [`LoomError::MissingSection`] naming the first absent heading.
pub fn compose(
    template: &Template,
    fragments: &[&Fragment],
    bindings: &BindingContext,
) -> Result<ComposedDocument> {
    let doc = merge(template, fragments, bindings)?;
    if let Some(h) = doc.missing_sections.first() {
        return Err(LoomError::MissingSection {
            template: template.id.clone(),
            heading: h.to_string(),
        });
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Heading;
    use crate::types::DocumentState;

    fn ab_template() -> Template {
        Template::with_required(
            "ab",
            vec![Heading::new(2, "A"), Heading::new(2, "B")],
            "## A\n\nalpha for [PROJECT]\n",
        )
    }

    fn bindings() -> BindingContext {
        let mut b = BindingContext::new();
        b.bind("PROJECT", "contoso").unwrap();
        b
    }

    #[test]
    fn fragment_supplies_missing_heading() {
        let frag = Fragment::new("sections/b", "b", "beta").with_heading(Heading::new(2, "B"));
        let doc = compose(&ab_template(), &[&frag], &bindings()).unwrap();
        assert_eq!(doc.text, "## A\n\nalpha for contoso\n\n## B\n\nbeta\n");
        assert_eq!(doc.headings, vec![Heading::new(2, "A"), Heading::new(2, "B")]);
        assert_eq!(doc.state, DocumentState::Composed);
        assert_eq!(doc.fragments, vec!["sections/b"]);
    }

    #[test]
    fn missing_fragment_is_missing_section() {
        let err = compose(&ab_template(), &[], &bindings()).unwrap_err();
        match err {
            LoomError::MissingSection { heading, .. } => assert_eq!(heading, "## B"),
            other => panic!("unexpected: {other}"),
        }
        let doc = merge(&ab_template(), &[], &bindings()).unwrap();
        assert_eq!(doc.missing_sections, vec![Heading::new(2, "B")]);
        assert_eq!(doc.state, DocumentState::Composed);
    }

    #[test]
    fn markers_take_fragments_by_id_or_topic() {
        let t = Template::from_body(
            "t",
            "## Auth\n<!-- fragment:auth -->\n## Tools\n<!-- fragment:tools/az-cli -->\n<!-- fragment:unused -->\n",
        );
        let py = Fragment::new("auth/python", "auth", "credential = DefaultAzureCredential()\n");
        let cs = Fragment::new("auth/csharp", "auth", "new DefaultAzureCredential();\n");
        let az = Fragment::new("tools/az-cli", "az-cli", "az login\n");
        let doc = compose(&t, &[&py, &cs, &az], &BindingContext::new()).unwrap();
        assert_eq!(
            doc.text,
            "## Auth\ncredential = DefaultAzureCredential()\n\nnew DefaultAzureCredential();\n## Tools\naz login\n\n"
        );
    }

    #[test]
    fn unmarked_fragment_gets_title_heading() {
        let t = Template::from_body("t", "## Overview\n");
        let f = Fragment::new("services/key-vault", "key-vault", "Store secrets here.");
        let doc = compose(&t, &[&f], &BindingContext::new()).unwrap();
        assert_eq!(doc.text, "## Overview\n\n## Key Vault\n\nStore secrets here.\n");

        let own = Fragment::new("x", "x", "### Own Heading\nbody\n");
        let doc = compose(&t, &[&own], &BindingContext::new()).unwrap();
        assert!(doc.text.ends_with("### Own Heading\nbody\n"));
    }

    #[test]
    fn fragment_placeholders_resolved_in_same_pass() {
        let t = Template::from_body("t", "## Setup\n<!-- fragment:setup -->\n");
        let f = Fragment::new("setup", "setup", "az group create -n [RESOURCE_GROUP]");
        let mut b = BindingContext::new();
        b.bind("RESOURCE_GROUP", "rg-[PROJECT]").unwrap();
        let doc = compose(&t, &[&f], &b).unwrap();
        assert!(doc.text.contains("az group create -n rg-[PROJECT]"));
        assert!(doc.unresolved.is_empty());
    }

    #[test]
    fn unresolved_placeholders_are_reported() {
        let t = Template::from_body("t", "## A\nOwner: [OWNER]\n");
        let doc = compose(&t, &[], &BindingContext::new()).unwrap();
        assert_eq!(doc.unresolved, vec!["OWNER"]);
    }

    #[test]
    fn template_without_required_fragments_roundtrip() {
        let t = Template::from_body("t", "## A\ntext\n### A.1\n");
        let doc = compose(&t, &[], &BindingContext::new()).unwrap();
        assert_eq!(doc.text, t.body);
        assert!(doc.missing_sections.is_empty());
    }
}
