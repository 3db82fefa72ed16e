use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use loom_core::paths;
use loom_core::role::RoleGraph;
use std::path::Path;

#[derive(Subcommand)]
pub enum RoleSubcommand {
    /// List role definitions
    List,
    /// Show roles in execution order, grouped into parallel waves
    Order,
    /// Check role definitions: names, dependencies, extractions, cycles
    Check,
}

pub fn run(root: &Path, subcmd: RoleSubcommand, json: bool) -> anyhow::Result<()> {
    let graph = load(root)?;
    match subcmd {
        RoleSubcommand::List => list(&graph, json),
        RoleSubcommand::Order => order(&graph, json),
        RoleSubcommand::Check => check(&graph, json),
    }
}

fn load(root: &Path) -> anyhow::Result<RoleGraph> {
    let path = paths::roles_path(root);
    if !path.exists() {
        return Ok(RoleGraph::default_pipeline());
    }
    RoleGraph::load(&path).with_context(|| format!("invalid role definitions in {}", path.display()))
}

fn list(graph: &RoleGraph, json: bool) -> anyhow::Result<()> {
    let defs: Vec<_> = graph.topological_order();
    if json {
        return print_json(&defs);
    }
    let rows: Vec<Vec<String>> = defs
        .iter()
        .map(|d| {
            vec![
                d.name.clone(),
                d.template.clone(),
                d.depends_on.join(","),
                d.fragments.join(","),
            ]
        })
        .collect();
    print_table(&["ROLE", "TEMPLATE", "DEPENDS ON", "FRAGMENTS"], rows);
    Ok(())
}

fn order(graph: &RoleGraph, json: bool) -> anyhow::Result<()> {
    let waves: Vec<Vec<&str>> = graph
        .waves()
        .iter()
        .map(|w| w.iter().map(|d| d.name.as_str()).collect())
        .collect();
    if json {
        return print_json(&waves);
    }
    for (i, wave) in waves.iter().enumerate() {
        println!("{}. {}", i + 1, wave.join(", "));
    }
    Ok(())
}

fn check(graph: &RoleGraph, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({ "ok": true, "roles": graph.len() }));
    }
    println!("{} roles, no dependency cycles.", graph.len());
    Ok(())
}
