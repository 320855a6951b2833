use std::path::{Path, PathBuf};

use workflow_core::paths;

/// Resolve the community repository root.
///
/// Priority:
/// 1. `--repo` flag / `WORKFLOW_REPO` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `SConstruct`
/// 3. Fall back to `cwd`, which handlers will reject if it is not a repo root
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd).unwrap_or(cwd)
}

fn find_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| paths::is_repo_root(dir))
        .map(Path::to_path_buf)
}
