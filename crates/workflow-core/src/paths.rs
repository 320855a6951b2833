use crate::error::{Result, WorkflowError};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Overrides the per-user config directory (used by tests and sandboxes).
pub const CONFIG_DIR_ENV: &str = "WORKFLOW_CONFIG_DIR";

pub const CONFIG_DIR: &str = ".config/server-workflow-tool";
pub const SETTINGS_FILE: &str = "config.yaml";
pub const SESSION_FILE: &str = "session.yaml";

pub const EVERGREEN_CONFIG_FILE: &str = ".evergreen.yml";

/// Parent directory of all checked out repositories, relative to home.
pub const REPO_PARENT_DIR: &str = "mongodb";

/// Marker file identifying the root of the community repository.
pub const REPO_ROOT_MARKER: &str = "SConstruct";

/// Where the enterprise module lives inside the community checkout.
pub const ENTERPRISE_REL_PATH: &str = "src/mongo/db/modules/enterprise";

pub const VENV_PYTHON: &str = "python3-venv/bin/python";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn home_dir() -> Result<PathBuf> {
    home::home_dir().ok_or(WorkflowError::HomeNotFound)
}

/// `$WORKFLOW_CONFIG_DIR`, else `~/.config/server-workflow-tool`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    Ok(home_dir()?.join(CONFIG_DIR))
}

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

pub fn session_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SESSION_FILE)
}

pub fn evergreen_config_path(home: &Path) -> PathBuf {
    home.join(EVERGREEN_CONFIG_FILE)
}

pub fn repo_parent(home: &Path) -> PathBuf {
    home.join(REPO_PARENT_DIR)
}

/// Default location of the code review upload script.
pub fn default_upload_script(home: &Path) -> PathBuf {
    repo_parent(home)
        .join("kernel-tools")
        .join("codereview")
        .join("upload.py")
}

pub fn venv_python(repo_root: &Path) -> PathBuf {
    repo_root.join(VENV_PYTHON)
}

pub fn is_repo_root(dir: &Path) -> bool {
    dir.join(REPO_ROOT_MARKER).is_file()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
