//! `[NAME]` placeholder scanning and single-pass substitution.

use crate::binding::BindingContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"\[([A-Z][A-Z0-9_]*)\]").unwrap())
}

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap())
}

/// True if `name` is a legal placeholder name (`[A-Z][A-Z0-9_]*`).
pub fn is_valid_name(name: &str) -> bool {
    name_re().is_match(name)
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub text: String,
    /// Names left in the text, once each, in order of first appearance.
    pub unresolved: Vec<String>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// A placeholder occurrence: byte range of the whole `[NAME]` token plus the name.
struct Token<'a> {
    start: usize,
    end: usize,
    name: &'a str,
}

/// Scan `text` for placeholder tokens.
///
/// `[NAME](url)`, `[NAME][ref]` and `[label][NAME]` are Markdown links, not placeholders.
fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    token_re().captures_iter(text).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str();
        let next = text[whole.end()..].chars().next();
        let prev = text[..whole.start()].chars().next_back();
        if matches!(next, Some('(') | Some('[')) || prev == Some(']') {
            return None;
        }
        Some(Token {
            start: whole.start(),
            end: whole.end(),
            name,
        })
    })
}

/// Distinct placeholder names in `text`, in order of first appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens(text)
        .filter(|t| seen.insert(t.name))
        .map(|t| t.name.to_string())
        .collect()
}

/// Substitute every bound `[NAME]` in one linear pass.
///
/// Substituted values are copied verbatim and never rescanned, so a value
/// containing `[OTHER]` stays literal. Unbound tokens are left in place and
/// reported.
pub fn resolve(text: &str, bindings: &BindingContext) -> Resolution {
    let mut out = String::with_capacity(text.len());
    let mut unresolved: Vec<String> = Vec::new();
    let mut cursor = 0;

    for token in tokens(text) {
        out.push_str(&text[cursor..token.start]);
        match bindings.get(token.name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str(&text[token.start..token.end]);
                if !unresolved.iter().any(|n| n == token.name) {
                    unresolved.push(token.name.to_string());
                }
            }
        }
        cursor = token.end;
    }
    out.push_str(&text[cursor..]);

    Resolution {
        text: out,
        unresolved,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> BindingContext {
        let mut b = BindingContext::new();
        for (k, v) in pairs {
            b.bind(*k, *v).unwrap();
        }
        b
    }

    #[test]
    fn partial_resolution_reports_missing() {
        let r = resolve(
            "Hello [NAME], welcome to [PROJECT]",
            &ctx(&[("NAME", "Ann")]),
        );
        assert_eq!(r.text, "Hello Ann, welcome to [PROJECT]");
        assert_eq!(r.unresolved, vec!["PROJECT".to_string()]);
        assert!(!r.is_complete());
    }

    #[test]
    fn full_bindings_leave_nothing_unresolved() {
        let text = "# [PROJECT_NAME]\nRegion: [AZURE_REGION]\nOwner: [OWNER] / [OWNER]";
        let names = placeholders(text);
        let pairs: Vec<(String, String)> = names
            .iter()
            .map(|n| (n.clone(), format!("v-{n}")))
            .collect();
        let mut b = BindingContext::new();
        for (k, v) in &pairs {
            b.bind(k.clone(), v.clone()).unwrap();
        }
        let r = resolve(text, &b);
        assert!(r.is_complete());
        assert_eq!(r.text, "# v-PROJECT_NAME\nRegion: v-AZURE_REGION\nOwner: v-OWNER / v-OWNER");
    }

    #[test]
    fn values_are_not_rescanned() {
        let r = resolve("[A]", &ctx(&[("A", "[B]"), ("B", "boom")]));
        assert_eq!(r.text, "[B]");
        assert!(r.unresolved.is_empty());

        let r = resolve("[A]", &ctx(&[("A", "[A]")]));
        assert_eq!(r.text, "[A]");
    }

    #[test]
    fn unresolved_names_deduplicated_in_order() {
        let r = resolve("[B] [A] [B] [C]", &BindingContext::new());
        assert_eq!(r.unresolved, vec!["B", "A", "C"]);
        assert_eq!(r.text, "[B] [A] [B] [C]");
    }

    #[test]
    fn markdown_links_and_checkboxes_are_not_placeholders() {
        let text = "See [DOCS](https://learn.microsoft.com) and [guide][REF].\n- [ ] todo\n- [x] done\n";
        assert!(placeholders(text).is_empty());
        let text = "[Link text][ID] and [DOCS][1] and [x]";
        assert!(placeholders(text).is_empty());
    }

    #[test]
    fn date_like_values_are_opaque() {
        let r = resolve("Due [DATE] v[VERSION]", &ctx(&[("DATE", "2024-01-01"), ("VERSION", "1.0")]));
        assert_eq!(r.text, "Due 2024-01-01 v1.0");
    }

    #[test]
    fn name_grammar() {
        assert!(is_valid_name("PROJECT_NAME"));
        assert!(is_valid_name("A1"));
        assert!(!is_valid_name("project"));
        assert!(!is_valid_name("1A"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("A-B"));
    }
}
