use crate::context::Upstream;
use crate::document::ComposedDocument;
use crate::error::{LoomError, Result};
use crate::paths;
use crate::types::DocumentState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

const HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DocumentState>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Latest document per role plus a bounded run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: String,
    #[serde(default)]
    pub documents: BTreeMap<String, ComposedDocument>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl State {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            documents: BTreeMap::new(),
            history: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::state_path(root);
        if !path.exists() {
            return Err(LoomError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: State = serde_yaml::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::state_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            self.history.drain(..self.history.len() - HISTORY_LIMIT);
        }
        self.last_updated = Utc::now();
    }

    /// Store `doc` as the role's latest document, replacing any earlier one.
    pub fn record(&mut self, role: &str, doc: ComposedDocument) {
        self.push_history(HistoryEntry {
            role: role.to_string(),
            document_id: Some(doc.id),
            state: Some(doc.state),
            timestamp: Utc::now(),
            detail: doc.rejection.as_ref().map(|r| r.message.clone()),
        });
        self.documents.insert(role.to_string(), doc);
    }

    /// A stage that produced no document; the role's previous document is dropped.
    pub fn record_failure(&mut self, role: &str, detail: &str) {
        self.documents.remove(role);
        self.push_history(HistoryEntry {
            role: role.to_string(),
            document_id: None,
            state: None,
            timestamp: Utc::now(),
            detail: Some(detail.to_string()),
        });
    }

    /// Stored documents as pipeline input.
    pub fn upstream(&self) -> Upstream {
        self.documents.clone()
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
