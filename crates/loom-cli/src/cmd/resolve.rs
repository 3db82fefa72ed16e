use crate::output::print_json;
use anyhow::Context;
use loom_core::binding::BindingContext;
use loom_core::config::Config;
use loom_core::paths;
use loom_core::placeholder::resolve;
use std::path::Path;

pub fn run(root: &Path, file: &Path, set: &[String], json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    // Project bindings apply when run inside an initialized project.
    let base = if paths::config_path(root).exists() {
        Config::load(root)
            .context("failed to load config")?
            .base_bindings()?
    } else {
        BindingContext::new()
    };
    let bindings = super::bindings_from_flags(base, set)?;
    let resolution = resolve(&text, &bindings);

    if json {
        print_json(&resolution)?;
    } else {
        print!("{}", resolution.text);
    }

    if !resolution.is_complete() {
        anyhow::bail!(
            "unresolved placeholder(s): {}",
            resolution.unresolved.join(", ")
        );
    }
    Ok(())
}
