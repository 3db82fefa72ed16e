use crate::output::{print_json, print_table};
use anyhow::Context;
use loom_core::state::State;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let state = State::load(root).context("failed to load state")?;

    if json {
        let documents: Vec<_> = state
            .documents
            .iter()
            .map(|(role, d)| {
                serde_json::json!({
                    "role": role,
                    "document_id": d.id,
                    "template": d.template_id,
                    "state": d.state,
                    "rejection": d.rejection,
                    "updated": d.history.last().map(|h| h.at),
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "project": state.project,
            "documents": documents,
            "last": state.last_entry(),
        }));
    }

    println!("Project: {}", state.project);
    if state.documents.is_empty() {
        println!("No documents yet. Run: loom run");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = state
        .documents
        .iter()
        .map(|(role, d)| {
            vec![
                role.clone(),
                d.state.to_string(),
                d.template_id.clone(),
                d.rejection
                    .as_ref()
                    .map(|r| r.message.clone())
                    .unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["ROLE", "STATE", "TEMPLATE", "DETAIL"], rows);
    Ok(())
}
