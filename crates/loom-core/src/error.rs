use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoomError {
    #[error("not initialized: run 'loom init'")]
    NotInitialized,

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("missing required section '{heading}' in template '{template}'")]
    MissingSection { template: String, heading: String },

    #[error("dependency not satisfied for role '{role}': {reason}")]
    DependencyNotSatisfied { role: String, reason: String },

    #[error("unresolved placeholder(s): {}", .names.join(", "))]
    UnresolvedPlaceholder { names: Vec<String> },

    #[error("role dependency cycle: {}", .roles.join(" -> "))]
    CyclicDependency { roles: Vec<String> },

    #[error("invalid role '{role}': {reason}")]
    InvalidRole { role: String, reason: String },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("invalid frontmatter in {path}: {reason}")]
    InvalidFrontmatter { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LoomError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        LoomError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Short machine-readable tag, used when a rejection is persisted.
    pub fn kind(&self) -> &'static str {
        match self {
            LoomError::NotInitialized => "not_initialized",
            LoomError::NotFound { .. } => "not_found",
            LoomError::MissingSection { .. } => "missing_section",
            LoomError::DependencyNotSatisfied { .. } => "dependency_not_satisfied",
            LoomError::UnresolvedPlaceholder { .. } => "unresolved_placeholder",
            LoomError::CyclicDependency { .. } => "cyclic_dependency",
            LoomError::InvalidRole { .. } => "invalid_role",
            LoomError::InvalidTransition { .. } => "invalid_transition",
            LoomError::InvalidName { .. } => "invalid_name",
            LoomError::InvalidFrontmatter { .. } => "invalid_frontmatter",
            LoomError::Io(_) => "io",
            LoomError::Yaml(_) => "yaml",
            LoomError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, LoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let e = LoomError::not_found("topic", "python-auth");
        assert_eq!(e.to_string(), "topic not found: python-auth");

        let e = LoomError::UnresolvedPlaceholder {
            names: vec!["PROJECT".to_string(), "REGION".to_string()],
        };
        assert_eq!(e.to_string(), "unresolved placeholder(s): PROJECT, REGION");

        let e = LoomError::CyclicDependency {
            roles: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert!(e.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn kind_tags() {
        assert_eq!(
            LoomError::MissingSection {
                template: "t".to_string(),
                heading: "## B".to_string()
            }
            .kind(),
            "missing_section"
        );
        assert_eq!(LoomError::NotInitialized.kind(), "not_initialized");
    }
}
