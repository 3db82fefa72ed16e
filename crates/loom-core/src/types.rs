use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// DocumentState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Drafted,
    Composed,
    Validated,
    Delivered,
    Rejected,
}

impl DocumentState {
    pub fn all() -> &'static [DocumentState] {
        &[
            DocumentState::Drafted,
            DocumentState::Composed,
            DocumentState::Validated,
            DocumentState::Delivered,
            DocumentState::Rejected,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentState::Drafted => "drafted",
            DocumentState::Composed => "composed",
            DocumentState::Validated => "validated",
            DocumentState::Delivered => "delivered",
            DocumentState::Rejected => "rejected",
        }
    }

    /// Forward one step, or `Rejected` from `Composed`/`Validated`.
    pub fn can_transition_to(self, target: DocumentState) -> bool {
        use DocumentState::*;
        matches!(
            (self, target),
            (Drafted, Composed)
                | (Composed, Validated)
                | (Validated, Delivered)
                | (Composed, Rejected)
                | (Validated, Rejected)
        )
    }

    /// Downstream roles may consume a document in this state.
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, DocumentState::Validated | DocumentState::Delivered)
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentState {
    type Err = crate::error::LoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentState::all()
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| crate::error::LoomError::InvalidName {
                kind: "document state",
                name: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// FragmentCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentCategory {
    Language,
    Auth,
    Tool,
    Service,
    Role,
    Governance,
    General,
}

impl FragmentCategory {
    pub fn all() -> &'static [FragmentCategory] {
        &[
            FragmentCategory::Language,
            FragmentCategory::Auth,
            FragmentCategory::Tool,
            FragmentCategory::Service,
            FragmentCategory::Role,
            FragmentCategory::Governance,
            FragmentCategory::General,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FragmentCategory::Language => "language",
            FragmentCategory::Auth => "auth",
            FragmentCategory::Tool => "tool",
            FragmentCategory::Service => "service",
            FragmentCategory::Role => "role",
            FragmentCategory::Governance => "governance",
            FragmentCategory::General => "general",
        }
    }

    /// Category implied by the top-level directory a fragment lives in.
    pub fn from_dir_name(dir: &str) -> FragmentCategory {
        match dir {
            "language" | "languages" => FragmentCategory::Language,
            "auth" => FragmentCategory::Auth,
            "tool" | "tools" => FragmentCategory::Tool,
            "service" | "services" => FragmentCategory::Service,
            "role" | "roles" | "agents" => FragmentCategory::Role,
            "governance" | "policy" | "policies" => FragmentCategory::Governance,
            _ => FragmentCategory::General,
        }
    }
}

impl fmt::Display for FragmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FragmentCategory {
    type Err = crate::error::LoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FragmentCategory::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| crate::error::LoomError::InvalidName {
                kind: "fragment category",
                name: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn forward_transitions_only() {
        use DocumentState::*;
        assert!(Drafted.can_transition_to(Composed));
        assert!(Composed.can_transition_to(Validated));
        assert!(Validated.can_transition_to(Delivered));
        assert!(!Drafted.can_transition_to(Validated));
        assert!(!Composed.can_transition_to(Delivered));
        assert!(!Validated.can_transition_to(Composed));
    }

    #[test]
    fn rejected_reachable_and_terminal() {
        use DocumentState::*;
        assert!(Composed.can_transition_to(Rejected));
        assert!(Validated.can_transition_to(Rejected));
        assert!(!Drafted.can_transition_to(Rejected));
        assert!(!Delivered.can_transition_to(Rejected));
        for target in DocumentState::all() {
            assert!(!Rejected.can_transition_to(*target));
        }
    }

    #[test]
    fn state_parse() {
        for st in DocumentState::all() {
            assert_eq!(DocumentState::from_str(st.as_str()).unwrap(), *st);
        }
        assert!(DocumentState::from_str("approved").is_err());
    }

    #[test]
    fn category_from_dir() {
        assert_eq!(
            FragmentCategory::from_dir_name("languages"),
            FragmentCategory::Language
        );
        assert_eq!(FragmentCategory::from_dir_name("auth"), FragmentCategory::Auth);
        assert_eq!(
            FragmentCategory::from_dir_name("misc"),
            FragmentCategory::General
        );
        assert_eq!(
            FragmentCategory::from_str("governance").unwrap(),
            FragmentCategory::Governance
        );
    }
}
