use crate::error::{LoomError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const LOOM_DIR: &str = ".loom";
pub const CONFIG_FILE: &str = ".loom/config.yaml";
pub const STATE_FILE: &str = ".loom/state.yaml";
pub const ROLES_FILE: &str = ".loom/roles.yaml";
pub const REGISTRY_FILE: &str = ".loom/registry.yaml";

pub const DEFAULT_KNOWLEDGE_DIR: &str = "knowledge";
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";
pub const DEFAULT_OUTPUT_DIR: &str = "out";

pub const MARKDOWN_EXT: &str = "md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn loom_dir(root: &Path) -> PathBuf {
    root.join(LOOM_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn roles_path(root: &Path) -> PathBuf {
    root.join(ROLES_FILE)
}

pub fn registry_path(root: &Path) -> PathBuf {
    root.join(REGISTRY_FILE)
}

/// `out/<role>.md` under the configured output directory.
pub fn delivered_path(output_dir: &Path, role: &str) -> PathBuf {
    output_dir.join(format!("{role}.{MARKDOWN_EXT}"))
}

/// Fragment/template id for `path` relative to `base`: forward slashes, no extension.
pub fn relative_id(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let rel = rel.with_extension("");
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static ROLE_RE: OnceLock<Regex> = OnceLock::new();

fn role_re() -> &'static Regex {
    ROLE_RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9\-]*[a-z0-9]$|^[a-z]$").unwrap())
}

pub fn validate_role_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !role_re().is_match(name) {
        return Err(LoomError::InvalidName {
            kind: "role",
            name: name.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
