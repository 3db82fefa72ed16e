use crate::output::print_json;
use anyhow::Context;
use loom_core::document::ComposedDocument;
use loom_core::paths;
use loom_core::registry::Registry;
use loom_core::template::TemplateSet;
use loom_core::validate::Validator;
use std::path::Path;

pub fn run(root: &Path, file: &Path, template_id: &str, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
    let templates =
        TemplateSet::open(&config.templates_dir(root)).context("failed to load templates")?;
    let template = templates.get(template_id)?;
    let registry =
        Registry::load(&paths::registry_path(root)).context("failed to load registry")?;

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let doc = ComposedDocument::from_text(template_id, text);

    let validator = if config.validation.check_references {
        Validator::new(&registry)
    } else {
        Validator::without_registry()
    };
    let result = validator.validate(&doc, template);

    if json {
        print_json(&result)?;
    } else if result.ok {
        println!("{}: valid against '{template_id}'", file.display());
    } else {
        for e in &result.errors {
            println!("[invalid] {e}");
        }
    }

    result
        .into_result(template_id)
        .with_context(|| format!("{} failed validation", file.display()))
}
