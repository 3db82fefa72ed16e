use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use loom_core::template::TemplateSet;
use std::path::Path;

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// List templates
    List,
    /// Show a template's contract and body
    Show { id: String },
}

pub fn run(root: &Path, subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let templates =
        TemplateSet::open(&config.templates_dir(root)).context("failed to load templates")?;
    match subcmd {
        TemplateSubcommand::List => list(&templates, json),
        TemplateSubcommand::Show { id } => show(&templates, &id, json),
    }
}

fn list(templates: &TemplateSet, json: bool) -> anyhow::Result<()> {
    if json {
        let values: Vec<_> = templates
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "description": t.description,
                    "required": t.required,
                    "placeholders": t.declared_placeholders(),
                })
            })
            .collect();
        return print_json(&values);
    }
    if templates.is_empty() {
        println!("No templates yet.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = templates
        .iter()
        .map(|t| {
            vec![
                t.id.clone(),
                t.required.len().to_string(),
                t.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["ID", "SECTIONS", "DESCRIPTION"], rows);
    Ok(())
}

fn show(templates: &TemplateSet, id: &str, json: bool) -> anyhow::Result<()> {
    let t = templates.get(id)?;
    if json {
        return print_json(t);
    }
    println!("Template: {}", t.id);
    if let Some(d) = &t.description {
        println!("{d}");
    }
    println!("\nRequired headings:");
    for h in &t.required {
        println!("  {h}");
    }
    let placeholders = t.declared_placeholders();
    if !placeholders.is_empty() {
        println!("\nPlaceholders:");
        for p in placeholders {
            let note = if t.is_optional(&p) { " (optional)" } else { "" };
            println!("  [{p}]{note}");
        }
    }
    Ok(())
}
