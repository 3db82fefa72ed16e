use crate::error::{LoomError, Result};
use crate::placeholder::is_valid_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder name → value bindings for one composition request.
///
/// Names are checked against the placeholder grammar on insert, so a context
/// can only ever bind tokens that `[NAME]` scanning could produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingContext {
    values: BTreeMap<String, String>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut ctx = Self::new();
        for (k, v) in map {
            ctx.bind(k.clone(), v.clone())?;
        }
        Ok(ctx)
    }

    /// Bind `name` to `value`, replacing any previous value.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(LoomError::InvalidName {
                kind: "placeholder",
                name,
            });
        }
        self.values.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: &BindingContext) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Bound names that do not appear in `declared`.
    pub fn undeclared<'a>(&'a self, declared: &[String]) -> Vec<&'a str> {
        self.names()
            .filter(|n| !declared.iter().any(|d| d == n))
            .collect()
    }
}

/// Parse a `NAME=VALUE` assignment. The value may itself contain `=`.
pub fn parse_assignment(s: &str) -> Result<(String, String)> {
    let Some((name, value)) = s.split_once('=') else {
        return Err(LoomError::InvalidName {
            kind: "binding",
            name: s.to_string(),
        });
    };
    let name = name.trim();
    if !is_valid_name(name) {
        return Err(LoomError::InvalidName {
            kind: "placeholder",
            name: name.to_string(),
        });
    }
    Ok((name.to_string(), value.to_string()))
}
