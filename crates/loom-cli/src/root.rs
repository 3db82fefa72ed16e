use loom_core::paths::LOOM_DIR;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `LOOM_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of `start` containing `.loom/`
/// 3. Nearest ancestor of `start` containing `.git/`
/// 4. `start` itself
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover(&cwd)
}

fn discover(start: &Path) -> PathBuf {
    for marker in [LOOM_DIR, ".git"] {
        if let Some(found) = start.ancestors().find(|d| d.join(marker).is_dir()) {
            return found.to_path_buf();
        }
    }
    start.to_path_buf()
}
