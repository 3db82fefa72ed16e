pub mod compose;
pub mod config;
pub mod fragment;
pub mod init;
pub mod resolve;
pub mod role;
pub mod run;
pub mod state;
pub mod template;
pub mod validate;

use anyhow::Context;
use loom_core::binding::{parse_assignment, BindingContext};
use loom_core::config::Config;
use loom_core::project::Project;
use std::path::Path;

pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load config")
}

pub(crate) fn open_project(root: &Path) -> anyhow::Result<Project> {
    Project::open(root).with_context(|| format!("failed to load project at {}", root.display()))
}

/// `--set NAME=VALUE` flags layered over `base`.
pub(crate) fn bindings_from_flags(
    base: BindingContext,
    flags: &[String],
) -> anyhow::Result<BindingContext> {
    let mut ctx = base;
    for flag in flags {
        let (name, value) =
            parse_assignment(flag).with_context(|| format!("invalid --set '{flag}'"))?;
        ctx.bind(name, value)?;
    }
    Ok(ctx)
}
