use crate::error::{LoomError, Result};
use crate::markdown::{headings, Heading};
use crate::placeholder::placeholders;
use crate::types::DocumentState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: DocumentState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// [`LoomError::kind`] tag of the failure.
    pub kind: String,
    pub message: String,
}

/// Template + fragments + bindings after merging, tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedDocument {
    pub id: Uuid,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub text: String,
    #[serde(default)]
    pub unresolved: Vec<String>,
    #[serde(default)]
    pub headings: Vec<Heading>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_sections: Vec<Heading>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<String>,
    pub state: DocumentState,
    pub history: Vec<StateChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl ComposedDocument {
    /// A fresh instance in `Drafted`. Every attempt at a role gets a new id.
    pub fn draft(template_id: impl Into<String>, role: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id: template_id.into(),
            role,
            text: String::new(),
            unresolved: Vec::new(),
            headings: Vec::new(),
            missing_sections: Vec::new(),
            fragments: Vec::new(),
            state: DocumentState::Drafted,
            history: vec![StateChange {
                state: DocumentState::Drafted,
                at: Utc::now(),
            }],
            rejection: None,
        }
    }

    /// Wrap externally produced text (e.g. a file handed to `loom validate`)
    /// as a `Composed` document so it can go through validation.
    pub fn from_text(template_id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut doc = Self::draft(template_id, None);
        let text = text.into();
        doc.unresolved = placeholders(&text);
        doc.headings = headings(&text);
        doc.text = text;
        doc.push_state(DocumentState::Composed);
        doc
    }

    fn push_state(&mut self, state: DocumentState) {
        self.state = state;
        self.history.push(StateChange {
            state,
            at: Utc::now(),
        });
    }

    fn transition(&mut self, target: DocumentState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(LoomError::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.push_state(target);
        Ok(())
    }

    pub fn mark_composed(&mut self) -> Result<()> {
        self.transition(DocumentState::Composed)
    }

    pub fn mark_validated(&mut self) -> Result<()> {
        self.transition(DocumentState::Validated)
    }

    pub fn deliver(&mut self) -> Result<()> {
        self.transition(DocumentState::Delivered)
    }

    /// Move to the terminal `Rejected` state, recording why.
    pub fn reject(&mut self, cause: &LoomError) -> Result<()> {
        self.transition(DocumentState::Rejected)?;
        self.rejection = Some(Rejection {
            kind: cause.kind().to_string(),
            message: cause.to_string(),
        });
        Ok(())
    }

    pub fn is_rejected(&self) -> bool {
        self.state == DocumentState::Rejected
    }

    /// Usable as upstream context by dependent roles.
    pub fn satisfies_dependency(&self) -> bool {
        self.state.satisfies_dependency()
    }
}
