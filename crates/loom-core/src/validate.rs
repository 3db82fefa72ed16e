//! Validation Layer: structural contract checks on composed documents.

use crate::document::ComposedDocument;
use crate::error::{LoomError, Result};
use crate::markdown::Heading;
use crate::registry::{references, Registry};
use crate::template::Template;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationError {
    MissingHeading { heading: Heading },
    DuplicateHeading { heading: Heading, count: usize },
    HeadingOutOfOrder { heading: Heading, after: Heading },
    UnresolvedPlaceholder { name: String },
    UnknownReference { key: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingHeading { heading } => {
                write!(f, "required heading '{heading}' is missing")
            }
            ValidationError::DuplicateHeading { heading, count } => {
                write!(f, "required heading '{heading}' appears {count} times")
            }
            ValidationError::HeadingOutOfOrder { heading, after } => {
                write!(f, "heading '{heading}' must come before '{after}'")
            }
            ValidationError::UnresolvedPlaceholder { name } => {
                write!(f, "placeholder [{name}] is unresolved")
            }
            ValidationError::UnknownReference { key } => {
                write!(f, "reference '{key}' is not in the registry")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }

    /// Collapse into the engine's error kinds. The first error decides the kind;
    /// all unresolved names are reported together.
    pub fn into_result(self, template_id: &str) -> Result<()> {
        let Some(first) = self.errors.first() else {
            return Ok(());
        };
        Err(match first {
            ValidationError::MissingHeading { heading }
            | ValidationError::DuplicateHeading { heading, .. }
            | ValidationError::HeadingOutOfOrder { heading, .. } => LoomError::MissingSection {
                template: template_id.to_string(),
                heading: heading.to_string(),
            },
            ValidationError::UnresolvedPlaceholder { .. } => LoomError::UnresolvedPlaceholder {
                names: self
                    .errors
                    .iter()
                    .filter_map(|e| match e {
                        ValidationError::UnresolvedPlaceholder { name } => Some(name.clone()),
                        _ => None,
                    })
                    .collect(),
            },
            ValidationError::UnknownReference { key } => {
                LoomError::not_found("registry entry", key.clone())
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct Validator<'a> {
    registry: Option<&'a Registry>,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Skip cross-reference checks.
    pub fn without_registry() -> Self {
        Self { registry: None }
    }

    pub fn validate(&self, doc: &ComposedDocument, template: &Template) -> ValidationResult {
        let mut errors = check_headings(&doc.headings, &template.required);

        errors.extend(
            doc.unresolved
                .iter()
                .filter(|n| !template.is_optional(n))
                .map(|n| ValidationError::UnresolvedPlaceholder { name: n.clone() }),
        );

        if let Some(registry) = self.registry {
            errors.extend(
                references(&doc.text)
                    .into_iter()
                    .filter(|k| !registry.contains(k))
                    .map(|key| ValidationError::UnknownReference { key }),
            );
        }

        ValidationResult::from_errors(errors)
    }
}

/// Each required heading exactly once, in the required relative order.
fn check_headings(present: &[Heading], required: &[Heading]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut last: Option<(usize, &Heading)> = None;

    for heading in required {
        let positions: Vec<usize> = present
            .iter()
            .enumerate()
            .filter(|(_, h)| *h == heading)
            .map(|(i, _)| i)
            .collect();
        match positions.as_slice() {
            [] => errors.push(ValidationError::MissingHeading {
                heading: heading.clone(),
            }),
            [pos] => {
                if let Some((last_pos, last_heading)) = last {
                    if *pos < last_pos {
                        errors.push(ValidationError::HeadingOutOfOrder {
                            heading: last_heading.clone(),
                            after: heading.clone(),
                        });
                    }
                }
                last = Some((*pos, heading));
            }
            many => errors.push(ValidationError::DuplicateHeading {
                heading: heading.clone(),
                count: many.len(),
            }),
        }
    }
    errors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingContext;
    use crate::compose::merge;

    fn h(s: &str) -> Heading {
        s.parse().unwrap()
    }

    fn template(required: &[&str], body: &str) -> Template {
        Template::with_required("t", required.iter().map(|s| h(s)).collect(), body)
    }

    #[test]
    fn valid_iff_required_headings_in_base_body() {
        let v = Validator::without_registry();

        let t = template(&["## A", "## B"], "## A\n## B\n");
        let doc = merge(&t, &[], &BindingContext::new()).unwrap();
        assert!(v.validate(&doc, &t).ok);

        let t = template(&["## A", "## B"], "## A\n");
        let doc = merge(&t, &[], &BindingContext::new()).unwrap();
        let r = v.validate(&doc, &t);
        assert!(!r.ok);
        assert_eq!(
            r.errors,
            vec![ValidationError::MissingHeading { heading: h("## B") }]
        );
    }

    #[test]
    fn repeated_subsections_validate_against_own_body() {
        let v = Validator::without_registry();
        let t = Template::from_body("t", "## Frontend\n### Notes\nx\n## Backend\n### Notes\ny\n");
        let doc = merge(&t, &[], &BindingContext::new()).unwrap();
        let r = v.validate(&doc, &t);
        assert!(r.ok, "{:?}", r.errors);
    }

    #[test]
    fn duplicate_and_order_violations() {
        let v = Validator::without_registry();
        let t = template(&["## A", "## B"], "");

        let doc = ComposedDocument::from_text("t", "## B\n## A\n");
        let r = v.validate(&doc, &t);
        assert_eq!(
            r.errors,
            vec![ValidationError::HeadingOutOfOrder {
                heading: h("## A"),
                after: h("## B")
            }]
        );

        let doc = ComposedDocument::from_text("t", "## A\n## A\n## B\n");
        let r = v.validate(&doc, &t);
        assert_eq!(
            r.errors,
            vec![ValidationError::DuplicateHeading {
                heading: h("## A"),
                count: 2
            }]
        );
    }

    #[test]
    fn heading_level_matters() {
        let v = Validator::without_registry();
        let t = template(&["## A"], "");
        let doc = ComposedDocument::from_text("t", "### A\n");
        assert!(!v.validate(&doc, &t).ok);
    }

    #[test]
    fn optional_placeholders_tolerated() {
        let v = Validator::without_registry();
        let mut t = template(&["## A"], "");
        t.optional.push("NOTES".to_string());
        let doc = ComposedDocument::from_text("t", "## A\n[NOTES] [OWNER]\n");
        let r = v.validate(&doc, &t);
        assert_eq!(
            r.errors,
            vec![ValidationError::UnresolvedPlaceholder {
                name: "OWNER".to_string()
            }]
        );
        assert!(matches!(
            r.into_result("t"),
            Err(LoomError::UnresolvedPlaceholder { names }) if names == vec!["OWNER".to_string()]
        ));
    }

    #[test]
    fn references_checked_against_registry() {
        let mut registry = Registry::new();
        registry.insert("key-vault", "Azure Key Vault");
        let v = Validator::new(&registry);
        let t = template(&[], "");
        let doc = ComposedDocument::from_text("t", "{{ref:key-vault}} {{ref:redis}}");
        let r = v.validate(&doc, &t);
        assert_eq!(
            r.errors,
            vec![ValidationError::UnknownReference {
                key: "redis".to_string()
            }]
        );
        assert!(matches!(r.into_result("t"), Err(LoomError::NotFound { .. })));

        assert!(Validator::without_registry().validate(&doc, &t).ok);
    }

    #[test]
    fn into_result_ok_when_clean() {
        let r = ValidationResult::from_errors(Vec::new());
        assert!(r.ok);
        assert!(r.into_result("t").is_ok());
    }

    #[test]
    fn error_json_is_tagged() {
        let e = ValidationError::MissingHeading { heading: h("## B") };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"type\":\"missing_heading\""));
        assert!(json.contains("## B"));
    }
}
