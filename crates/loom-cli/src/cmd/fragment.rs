use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use loom_core::fragment::{Fragment, FragmentStore};
use loom_core::types::FragmentCategory;
use std::path::Path;

#[derive(Subcommand)]
pub enum FragmentSubcommand {
    /// List knowledge fragments
    List {
        /// Only this category (language, auth, tool, service, role, governance, general)
        #[arg(long)]
        category: Option<FragmentCategory>,
    },
    /// Find fragments by topic, tag or id
    Find { topic: String },
    /// Show one fragment
    Show { id: String },
}

pub fn run(root: &Path, subcmd: FragmentSubcommand, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let store = FragmentStore::open(config.knowledge_dir(root))
        .context("failed to load knowledge base")?;
    match subcmd {
        FragmentSubcommand::List { category } => list(&store, category, json),
        FragmentSubcommand::Find { topic } => find(&store, &topic, json),
        FragmentSubcommand::Show { id } => show(&store, &id, json),
    }
}

fn summary(f: &Fragment) -> serde_json::Value {
    serde_json::json!({
        "id": f.id,
        "topic": f.topic,
        "category": f.category,
        "tags": f.tags,
        "languages": f.languages,
    })
}

fn print_rows(fragments: &[&Fragment]) {
    let rows: Vec<Vec<String>> = fragments
        .iter()
        .map(|f| {
            vec![
                f.id.clone(),
                f.topic.clone(),
                f.category.to_string(),
                f.languages.join(","),
            ]
        })
        .collect();
    print_table(&["ID", "TOPIC", "CATEGORY", "LANGUAGES"], rows);
}

fn list(store: &FragmentStore, category: Option<FragmentCategory>, json: bool) -> anyhow::Result<()> {
    let fragments: Vec<&Fragment> = match category {
        Some(c) => store.by_category(c),
        None => store.iter().collect(),
    };

    if json {
        let values: Vec<_> = fragments.iter().map(|f| summary(f)).collect();
        return print_json(&values);
    }
    if fragments.is_empty() {
        println!("No fragments under {}.", store.base().display());
        return Ok(());
    }
    print_rows(&fragments);
    Ok(())
}

fn find(store: &FragmentStore, topic: &str, json: bool) -> anyhow::Result<()> {
    let found = store.find(topic)?;
    if json {
        let values: Vec<_> = found.iter().map(|f| summary(f)).collect();
        return print_json(&values);
    }
    print_rows(&found);
    Ok(())
}

fn show(store: &FragmentStore, id: &str, json: bool) -> anyhow::Result<()> {
    let fragment = store
        .get(id)
        .ok_or_else(|| loom_core::LoomError::not_found("fragment", id))?;
    if json {
        return print_json(fragment);
    }
    println!("Fragment: {} ({})", fragment.id, fragment.display_title());
    println!("Topic:    {}", fragment.topic);
    println!("Category: {}", fragment.category);
    if !fragment.tags.is_empty() {
        println!("Tags:     {}", fragment.tags.join(", "));
    }
    if !fragment.languages.is_empty() {
        println!("Languages: {}", fragment.languages.join(", "));
    }
    if let Some(h) = &fragment.heading {
        println!("Heading:  {h}");
    }
    println!();
    print!("{}", fragment.body);
    if !fragment.body.ends_with('\n') {
        println!();
    }
    Ok(())
}
