use crate::output::print_json;
use anyhow::Context;
use loom_core::compose::merge;
use loom_core::fragment::Fragment;
use loom_core::validate::Validator;
use loom_core::LoomError;
use std::path::{Path, PathBuf};

pub struct ComposeArgs {
    pub template: String,
    pub fragments: Vec<String>,
    pub topics: Vec<String>,
    pub set: Vec<String>,
    pub output: Option<PathBuf>,
}

pub fn run(root: &Path, args: ComposeArgs, json: bool) -> anyhow::Result<()> {
    let project = super::open_project(root)?;
    let template = project.templates.get(&args.template)?;

    let mut selected: Vec<&Fragment> = Vec::new();
    for id in &args.fragments {
        let f = project
            .store
            .get(id)
            .ok_or_else(|| LoomError::not_found("fragment", id.clone()))?;
        if !selected.iter().any(|s| s.id == f.id) {
            selected.push(f);
        }
    }
    for topic in &args.topics {
        for f in project.store.find_for(topic, &project.config.project.languages)? {
            if !selected.iter().any(|s| s.id == f.id) {
                selected.push(f);
            }
        }
    }

    let base = project.config.base_bindings()?;
    let bindings = super::bindings_from_flags(base, &args.set)?;
    let mut doc = merge(template, &selected, &bindings)?;

    let validator = if project.config.validation.check_references {
        Validator::new(&project.registry)
    } else {
        Validator::without_registry()
    };
    let result = validator.validate(&doc, template);
    let verdict = result.clone().into_result(&template.id);
    match &verdict {
        Ok(()) => doc.mark_validated()?,
        Err(err) => doc.reject(err)?,
    }

    if let Some(path) = &args.output {
        loom_core::io::atomic_write(path, doc.text.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        print_json(&serde_json::json!({
            "document": doc,
            "validation": result,
        }))?;
    } else {
        if args.output.is_none() {
            print!("{}", doc.text);
        }
        for e in &result.errors {
            eprintln!("[invalid] {e}");
        }
    }

    verdict.with_context(|| format!("composed document for '{}' is invalid", template.id))?;
    if let Some(path) = &args.output {
        if !json {
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
