//! Persisted session state: in-progress tickets plus cached identity.
//!
//! The state is split in two. [`PersistedFields`] is the only thing that is
//! ever serialized. [`RuntimeOnlyFields`] holds passwords and the
//! authenticated issue-tracker client and has no serde impls at all, so a
//! secret cannot reach disk by omission.
//!
//! One [`SessionState`] is loaded per process, mutated by a single command
//! handler and saved once when that handler returns.

use crate::credentials::{Prompter, SecretStore};
use crate::error::{Result, WorkflowError};
use crate::jira::{Credentials, JiraApi, JiraConnector};
use crate::types::{Repo, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SESSION_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Per-repo values
// ---------------------------------------------------------------------------

/// One optional value per sub-repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerRepo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<String>,
}

impl PerRepo {
    pub fn get(&self, repo: Repo) -> Option<&str> {
        match repo {
            Repo::Community => self.community.as_deref(),
            Repo::Enterprise => self.enterprise.as_deref(),
        }
    }

    pub fn set(&mut self, repo: Repo, value: impl Into<String>) {
        let slot = match repo {
            Repo::Community => &mut self.community,
            Repo::Enterprise => &mut self.enterprise,
        };
        *slot = Some(value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.community.is_none() && self.enterprise.is_none()
    }
}

/// Commit hashes produced by one `commit` invocation.
pub type CommitInfo = PerRepo;

/// Code review issue numbers, at most one per repo.
pub type CodeReviewInfo = PerRepo;

// ---------------------------------------------------------------------------
// TicketRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub base_branch: String,
    #[serde(default)]
    pub ticket_summary: String,
    /// Append-only.
    #[serde(default)]
    pub commits: Vec<CommitInfo>,
    /// Append-only.
    #[serde(default)]
    pub patch_ids: Vec<String>,
    #[serde(default)]
    pub code_review: CodeReviewInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl TicketRecord {
    pub fn new(base_branch: impl Into<String>, ticket_summary: impl Into<String>) -> Self {
        Self {
            base_branch: base_branch.into(),
            ticket_summary: ticket_summary.into(),
            commits: Vec::new(),
            patch_ids: Vec::new(),
            code_review: CodeReviewInfo::default(),
            started_at: Some(Utc::now()),
        }
    }

    pub fn record_commit(&mut self, commit: CommitInfo) {
        if !commit.is_empty() {
            self.commits.push(commit);
        }
    }

    pub fn record_patch(&mut self, patch_id: impl Into<String>) {
        self.patch_ids.push(patch_id.into());
    }

    pub fn latest_patch(&self) -> Option<&str> {
        self.patch_ids.last().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Persisted / runtime split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedFields {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub in_progress_tickets: BTreeMap<TicketId, TicketRecord>,
}

fn default_version() -> u32 {
    1
}

impl Default for PersistedFields {
    fn default() -> Self {
        Self {
            version: SESSION_VERSION,
            username: None,
            in_progress_tickets: BTreeMap::new(),
        }
    }
}

/// Issue-tracker authentication, one state per process.
pub enum AuthState {
    Unauthenticated,
    Retrying { failures: u32 },
    Authenticated(Box<dyn JiraApi>),
    /// Terminal: no further attempts are made in this process.
    Failed { attempts: u32 },
}

impl AuthState {
    fn failures(&self) -> u32 {
        match self {
            AuthState::Retrying { failures } => *failures,
            AuthState::Failed { attempts } => *attempts,
            AuthState::Unauthenticated | AuthState::Authenticated(_) => 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => f.write_str("Unauthenticated"),
            AuthState::Retrying { failures } => write!(f, "Retrying({failures})"),
            AuthState::Authenticated(_) => f.write_str("Authenticated"),
            AuthState::Failed { attempts } => write!(f, "Failed({attempts})"),
        }
    }
}

/// Never serialized.
pub struct RuntimeOnlyFields {
    passwords: HashMap<String, String>,
    auth: AuthState,
}

impl Default for RuntimeOnlyFields {
    fn default() -> Self {
        Self {
            passwords: HashMap::new(),
            auth: AuthState::Unauthenticated,
        }
    }
}

impl fmt::Debug for RuntimeOnlyFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOnlyFields")
            .field("cached_passwords", &self.passwords.len())
            .field("auth", &self.auth)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SessionState {
    path: PathBuf,
    persisted: PersistedFields,
    runtime: RuntimeOnlyFields,
}

impl SessionState {
    /// An empty session that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            persisted: PersistedFields::default(),
            runtime: RuntimeOnlyFields::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the session at `path`. Never fails: an unreadable file is logged
    /// and replaced by an empty session so the tool stays usable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("no session file at {}, starting fresh", path.display());
            return Self::new(path);
        }
        match Self::read(path) {
            Ok(persisted) => Self {
                path: path.to_path_buf(),
                persisted,
                runtime: RuntimeOnlyFields::default(),
            },
            Err(e) => {
                tracing::error!("{e}");
                tracing::warn!(
                    "Could not read session file at {}, using empty session as fallback",
                    path.display()
                );
                Self::new(path)
            }
        }
    }

    fn read(path: &Path) -> Result<PersistedFields> {
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(PersistedFields::default());
        }
        let persisted: PersistedFields = serde_yaml::from_str(&data)?;
        if persisted.version > SESSION_VERSION {
            return Err(WorkflowError::InvalidConfig(format!(
                "session file version {} is newer than supported version {SESSION_VERSION}",
                persisted.version
            )));
        }
        Ok(persisted)
    }

    /// Write the persisted fields, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let mut persisted = self.persisted.clone();
        persisted.version = SESSION_VERSION;
        let data = serde_yaml::to_string(&persisted)?;
        crate::io::atomic_write(&self.path, data.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persisted(&self) -> &PersistedFields {
        &self.persisted
    }

    // -----------------------------------------------------------------------
    // Tickets
    // -----------------------------------------------------------------------

    pub fn tickets(&self) -> &BTreeMap<TicketId, TicketRecord> {
        &self.persisted.in_progress_tickets
    }

    pub fn is_in_progress(&self, ticket: &TicketId) -> bool {
        self.persisted.in_progress_tickets.contains_key(ticket)
    }

    pub fn ticket(&self, ticket: &TicketId) -> Option<&TicketRecord> {
        self.persisted.in_progress_tickets.get(ticket)
    }

    pub fn ticket_mut(&mut self, ticket: &TicketId) -> Option<&mut TicketRecord> {
        self.persisted.in_progress_tickets.get_mut(ticket)
    }

    /// Resolve the in-progress ticket a branch belongs to.
    pub fn ticket_for_branch(&self, branch: &str) -> Result<(TicketId, &TicketRecord)> {
        let unknown = || WorkflowError::UnknownBranch(branch.to_string());
        let id = TicketId::from_branch(branch).ok_or_else(unknown)?;
        let record = self.persisted.in_progress_tickets.get(&id).ok_or_else(unknown)?;
        Ok((id, record))
    }

    /// Start tracking a ticket. Returns false, leaving the existing record
    /// untouched, when the ticket is already in progress.
    pub fn start_ticket(&mut self, ticket: TicketId, record: TicketRecord) -> bool {
        if self.is_in_progress(&ticket) {
            return false;
        }
        self.persisted.in_progress_tickets.insert(ticket, record);
        true
    }

    pub fn finish_ticket(&mut self, ticket: &TicketId) -> Option<TicketRecord> {
        self.persisted.in_progress_tickets.remove(ticket)
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    pub fn cached_username(&self) -> Option<&str> {
        self.persisted.username.as_deref()
    }

    pub fn remember_username(&mut self, username: impl Into<String>) {
        self.persisted.username = Some(username.into());
    }

    /// The cached username, prompting for it once if unknown.
    pub fn username(&mut self, prompter: &dyn Prompter) -> Result<String> {
        if let Some(name) = &self.persisted.username {
            return Ok(name.clone());
        }
        let name = loop {
            let answer = prompter.text("Please enter your Jira username (firstname.lastname): ")?;
            let answer = answer.trim();
            if !answer.is_empty() {
                break answer.to_string();
            }
        };
        self.persisted.username = Some(name.clone());
        Ok(name)
    }

    /// Password lookup in fixed order: memory, then the secret store, then an
    /// interactive prompt whose answer is written back to the store.
    pub fn password(
        &mut self,
        service: &str,
        secrets: &dyn SecretStore,
        prompter: &dyn Prompter,
    ) -> Result<String> {
        if let Some(pwd) = self.runtime.passwords.get(service) {
            return Ok(pwd.clone());
        }
        let username = self.username(prompter)?;

        let stored = secrets.get(service, &username).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            None
        });
        let pwd = match stored {
            Some(pwd) => pwd,
            None => {
                let pwd = loop {
                    let answer = prompter.password(&format!("Please enter the password for {username}: "))?;
                    if !answer.is_empty() {
                        break answer;
                    }
                };
                secrets.set(service, &username, &pwd)?;
                pwd
            }
        };
        self.runtime.passwords.insert(service.to_string(), pwd.clone());
        Ok(pwd)
    }

    /// Forget the username and password so the next request prompts again.
    pub fn reset_credentials(&mut self, service: &str, secrets: &dyn SecretStore) {
        self.runtime.passwords.remove(service);
        if let Some(username) = self.persisted.username.take() {
            if let Err(e) = secrets.delete(service, &username) {
                tracing::warn!("could not remove stale password: {e}");
            }
        }
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.runtime.auth
    }

    /// The authenticated issue-tracker client, connecting on first use.
    ///
    /// Each authentication failure resets the credentials so the next attempt
    /// prompts afresh. After `retry_limit` consecutive failures the session is
    /// `Failed` for the rest of the process.
    pub fn authenticated_client(
        &mut self,
        service: &str,
        connector: &dyn JiraConnector,
        secrets: &dyn SecretStore,
        prompter: &dyn Prompter,
        retry_limit: u32,
    ) -> Result<&dyn JiraApi> {
        let limit = retry_limit.max(1);
        loop {
            match &self.runtime.auth {
                AuthState::Authenticated(_) => break,
                AuthState::Failed { attempts } => {
                    return Err(WorkflowError::AuthRetriesExhausted {
                        service: service.to_string(),
                        attempts: *attempts,
                    })
                }
                AuthState::Unauthenticated | AuthState::Retrying { .. } => {}
            }

            let failures = self.runtime.auth.failures();
            let credentials = Credentials {
                username: self.username(prompter)?,
                password: self.password(service, secrets, prompter)?,
            };
            match connector.connect(&credentials) {
                Ok(client) => self.runtime.auth = AuthState::Authenticated(client),
                Err(e) if e.is_auth_failure() => {
                    let failures = failures + 1;
                    tracing::error!("{e} (attempt {failures} of {limit})");
                    self.reset_credentials(service, secrets);
                    self.runtime.auth = if failures >= limit {
                        AuthState::Failed { attempts: failures }
                    } else {
                        AuthState::Retrying { failures }
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }

        match &self.runtime.auth {
            AuthState::Authenticated(client) => Ok(client.as_ref()),
            other => Err(WorkflowError::AuthRetriesExhausted {
                service: service.to_string(),
                attempts: other.failures(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
