use crate::output::{print_json, print_table};
use anyhow::Context;
use loom_core::document::ComposedDocument;
use loom_core::paths;
use loom_core::pipeline::{Pipeline, StageOutcome, StageReport};
use loom_core::state::State;
use std::path::Path;

pub fn run(root: &Path, role: Option<&str>, deliver: bool, json: bool) -> anyhow::Result<()> {
    let project = super::open_project(root)?;
    let pipeline = project.pipeline()?;
    let mut state = State::load(root).context("failed to load state")?;
    let out_dir = project.output_dir();

    let reports = match role {
        Some(role) => vec![run_one(&pipeline, &mut state, role, deliver, &out_dir)?],
        None => run_all(&pipeline, &mut state, deliver, &out_dir)?,
    };
    state.save(root).context("failed to save state")?;

    if json {
        print_json(&reports)?;
    } else {
        let rows: Vec<Vec<String>> = reports.iter().map(report_row).collect();
        print_table(&["ROLE", "OUTCOME", "DETAIL"], rows);
    }

    let failed = reports.iter().filter(|r| !r.is_validated()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} stage(s) did not validate", reports.len());
    }
    Ok(())
}

fn run_one(
    pipeline: &Pipeline<'_>,
    state: &mut State,
    role: &str,
    deliver: bool,
    out_dir: &Path,
) -> anyhow::Result<StageReport> {
    let upstream = state.upstream();
    match pipeline.run_stage(role, &upstream) {
        Ok(mut doc) => {
            if doc.satisfies_dependency() && deliver {
                deliver_document(pipeline, &mut doc, role, out_dir)?;
            }
            let report = StageReport::from_document(role, &doc);
            state.record(role, doc);
            Ok(report)
        }
        Err(e) => {
            state.record_failure(role, &e.to_string());
            Ok(StageReport::failed(role, &e))
        }
    }
}

fn run_all(
    pipeline: &Pipeline<'_>,
    state: &mut State,
    deliver: bool,
    out_dir: &Path,
) -> anyhow::Result<Vec<StageReport>> {
    let mut upstream = state.upstream();
    let reports = pipeline.run_all(&mut upstream);

    for report in &reports {
        match upstream.remove(&report.role) {
            Some(mut doc) => {
                if doc.satisfies_dependency() && deliver {
                    deliver_document(pipeline, &mut doc, &report.role, out_dir)?;
                }
                state.record(&report.role, doc);
            }
            None => {
                let detail = match &report.outcome {
                    StageOutcome::Skipped { blocked_by } => {
                        format!("skipped: '{blocked_by}' did not validate")
                    }
                    StageOutcome::Failed { message, .. } => message.clone(),
                    _ => String::new(),
                };
                state.record_failure(&report.role, &detail);
            }
        }
    }
    Ok(reports)
}

fn deliver_document(
    pipeline: &Pipeline<'_>,
    doc: &mut ComposedDocument,
    role: &str,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let path = paths::delivered_path(out_dir, role);
    loom_core::io::atomic_write(&path, doc.text.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    pipeline.deliver(doc)?;
    Ok(())
}

fn report_row(r: &StageReport) -> Vec<String> {
    let (outcome, detail) = match &r.outcome {
        StageOutcome::Validated => ("validated", String::new()),
        StageOutcome::Rejected { message, .. } => ("rejected", message.clone()),
        StageOutcome::Failed { message, .. } => ("failed", message.clone()),
        StageOutcome::Skipped { blocked_by } => ("skipped", format!("blocked by {blocked_by}")),
    };
    vec![r.role.clone(), outcome.to_string(), detail]
}
