use crate::error::{Result, WorkflowError};
use crate::paths;
use crate::types::{Status, Transition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Jira workflow ids
// ---------------------------------------------------------------------------

// TODO: confirm the "In Code Review" and "Closed" ids against the SERVER
// project's workflow scheme; until then they can be overridden per user.
const DEFAULT_STATUS_IDS: &[(Status, &str)] = &[
    (Status::Open, "1"),
    (Status::InProgress, "3"),
    (Status::InCodeReview, "7"),
    (Status::Closed, "1000"),
];

const DEFAULT_TRANSITION_IDS: &[(Transition, &str)] = &[
    (Transition::StartProgress, "4"),
    (Transition::StartCodeReview, "761"),
    (Transition::CloseIssue, "981"),
];

/// Maps human-readable status and transition names to the opaque ids the
/// issue tracker expects. Entries in the config file take precedence over the
/// built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowTable {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub status_ids: BTreeMap<Status, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub transition_ids: BTreeMap<Transition, String>,
}

impl WorkflowTable {
    pub fn status_id(&self, status: Status) -> Result<&str> {
        self.status_ids
            .get(&status)
            .map(String::as_str)
            .or_else(|| lookup(DEFAULT_STATUS_IDS, status))
            .ok_or_else(|| WorkflowError::UnmappedWorkflowName {
                kind: "status",
                name: status.to_string(),
            })
    }

    pub fn transition_id(&self, transition: Transition) -> Result<&str> {
        self.transition_ids
            .get(&transition)
            .map(String::as_str)
            .or_else(|| lookup(DEFAULT_TRANSITION_IDS, transition))
            .ok_or_else(|| WorkflowError::UnmappedWorkflowName {
                kind: "transition",
                name: transition.to_string(),
            })
    }
}

fn lookup<K: PartialEq + Copy>(table: &'static [(K, &'static str)], key: K) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, id)| *id)
}

// ---------------------------------------------------------------------------
// JiraConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default = "default_jira_server")]
    pub server: String,
    /// Service id under which the password is kept in the OS keyring.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
    #[serde(default = "default_auth_retry_limit")]
    pub auth_retry_limit: u32,
    /// Role that can see comments posted by the tool.
    #[serde(default = "default_comment_role")]
    pub comment_role: String,
    #[serde(flatten)]
    pub workflow: WorkflowTable,
}

fn default_jira_server() -> String {
    "https://jira.mongodb.org".to_string()
}

fn default_keyring_service() -> String {
    "server-workflow-tool/jira".to_string()
}

fn default_auth_retry_limit() -> u32 {
    3
}

fn default_comment_role() -> String {
    "Developers".to_string()
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            server: default_jira_server(),
            keyring_service: default_keyring_service(),
            auth_retry_limit: default_auth_retry_limit(),
            comment_role: default_comment_role(),
            workflow: WorkflowTable::default(),
        }
    }
}

impl JiraConfig {
    /// Never less than one attempt.
    pub fn retry_limit(&self) -> u32 {
        self.auth_retry_limit.max(1)
    }

    pub fn browse_url(&self, ticket: &str) -> String {
        format!("{}/browse/{ticket}", self.server.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// EvergreenConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvergreenConfig {
    #[serde(default = "default_patch_url_base")]
    pub patch_url_base: String,
    #[serde(default = "default_notifications_url")]
    pub notifications_url: String,
    #[serde(default = "default_settings_url")]
    pub settings_url: String,
    #[serde(default = "default_alias")]
    pub default_alias: String,
    /// Module name passed to `patch-set-module` for the enterprise repo.
    #[serde(default = "default_module")]
    pub enterprise_module: String,
}

fn default_patch_url_base() -> String {
    "https://evergreen.mongodb.com/version/".to_string()
}

fn default_notifications_url() -> String {
    "https://evergreen.mongodb.com/notifications".to_string()
}

fn default_settings_url() -> String {
    "https://evergreen.mongodb.com/settings".to_string()
}

fn default_alias() -> String {
    "required".to_string()
}

fn default_module() -> String {
    "enterprise".to_string()
}

impl Default for EvergreenConfig {
    fn default() -> Self {
        Self {
            patch_url_base: default_patch_url_base(),
            notifications_url: default_notifications_url(),
            settings_url: default_settings_url(),
            default_alias: default_alias(),
            enterprise_module: default_module(),
        }
    }
}

impl EvergreenConfig {
    pub fn patch_url(&self, patch_id: &str) -> String {
        if self.patch_url_base.ends_with('/') {
            format!("{}{patch_id}", self.patch_url_base)
        } else {
            format!("{}/{patch_id}", self.patch_url_base)
        }
    }
}

// ---------------------------------------------------------------------------
// CodeReviewConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeReviewConfig {
    /// Path to `upload.py`; defaults to `~/mongodb/kernel-tools/codereview/upload.py`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_script: Option<PathBuf>,
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

fn default_app_url() -> String {
    "https://mongodbcr.appspot.com".to_string()
}

impl Default for CodeReviewConfig {
    fn default() -> Self {
        Self {
            upload_script: None,
            app_url: default_app_url(),
        }
    }
}

impl CodeReviewConfig {
    pub fn upload_script(&self, home: &Path) -> PathBuf {
        self.upload_script
            .clone()
            .unwrap_or_else(|| paths::default_upload_script(home))
    }
}

// ---------------------------------------------------------------------------
// ToolConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub evergreen: EvergreenConfig,
    #[serde(default)]
    pub code_review: CodeReviewConfig,
    /// Python interpreter for the repo's buildscripts; defaults to the
    /// virtualenv inside the repo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PathBuf>,
    /// Git URL `self-update` installs from.
    #[serde(default = "default_update_source")]
    pub update_source: String,
}

fn default_update_source() -> String {
    "https://github.com/mongodb/server-workflow-tool.git".to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            jira: JiraConfig::default(),
            evergreen: EvergreenConfig::default(),
            code_review: CodeReviewConfig::default(),
            python: None,
            update_source: default_update_source(),
        }
    }
}

impl ToolConfig {
    /// Load `config.yaml` from `config_dir`. A missing file yields defaults; a
    /// malformed one is an error, since guessing would hide a typo.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = paths::settings_path(config_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&data)
            .map_err(|e| WorkflowError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub fn python(&self, repo_root: &Path) -> PathBuf {
        self.python
            .clone()
            .unwrap_or_else(|| paths::venv_python(repo_root))
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.jira.auth_retry_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "jira.auth_retry_limit is 0; one attempt will be made".to_string(),
            });
        } else if self.jira.auth_retry_limit > 5 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "jira.auth_retry_limit={} (>5 risks a Jira CAPTCHA lockout)",
                    self.jira.auth_retry_limit
                ),
            });
        }

        if !self.jira.server.starts_with("https://") && !self.jira.server.starts_with("http://") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("jira.server '{}' is not an http(s) URL", self.jira.server),
            });
        }

        for (status, id) in &self.jira.workflow.status_ids {
            if id.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("jira.status_ids has an empty id for '{status}'"),
                });
            }
        }
        for (transition, id) in &self.jira.workflow.transition_ids {
            if id.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("jira.transition_ids has an empty id for '{transition}'"),
                });
            }
        }

        if let Some(script) = &self.code_review.upload_script {
            if !script.exists() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "code_review.upload_script {} does not exist",
                        script.display()
                    ),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
