//! The per-invocation context handed to every command handler.
//!
//! A `Context` owns the loaded configuration, the one [`SessionState`] of the
//! process and boxed handles to every external collaborator. `main` builds it
//! once, runs one handler against it and saves the session afterwards.

use std::path::{Path, PathBuf};

use crate::codereview::CodeReviewTool;
use crate::config::{JiraConfig, ToolConfig};
use crate::credentials::{Prompter, SecretStore};
use crate::error::{Result, WorkflowError};
use crate::evergreen::Evergreen;
use crate::git::{Git, Repos};
use crate::jira::{self, Issue, JiraApi, JiraConnector, Visibility};
use crate::paths;
use crate::session::{SessionState, TicketRecord};
use crate::shell::CommandRunner;
use crate::types::{Repo, Status, TicketId, Transition};

/// Opens URLs for the user.
pub trait Browser {
    fn open(&self, url: &str) -> Result<()>;
}

/// Every external collaborator a handler may touch.
pub struct Adapters {
    pub runner: Box<dyn CommandRunner>,
    pub prompter: Box<dyn Prompter>,
    pub secrets: Box<dyn SecretStore>,
    pub connector: Box<dyn JiraConnector>,
    pub browser: Box<dyn Browser>,
}

/// Snapshot of the checked-out ticket. Mutations go through
/// `ctx.session.ticket_mut(&current.id)`.
#[derive(Debug, Clone)]
pub struct CurrentTicket {
    pub id: TicketId,
    pub branch: String,
    pub record: TicketRecord,
}

pub struct Context {
    pub config: ToolConfig,
    pub session: SessionState,
    repo_root: PathBuf,
    home: PathBuf,
    adapters: Adapters,
}

/// Errors that abort a handler even though the remote call they guard is
/// best-effort: the user could not be authenticated at all.
fn is_credential_failure(e: &WorkflowError) -> bool {
    matches!(
        e,
        WorkflowError::AuthRetriesExhausted { .. }
            | WorkflowError::SecretStore { .. }
            | WorkflowError::Prompt(_)
    )
}

fn jira_client<'s>(
    session: &'s mut SessionState,
    config: &JiraConfig,
    adapters: &Adapters,
) -> Result<&'s dyn JiraApi> {
    session.authenticated_client(
        &config.keyring_service,
        adapters.connector.as_ref(),
        adapters.secrets.as_ref(),
        adapters.prompter.as_ref(),
        config.retry_limit(),
    )
}

impl Context {
    pub fn new(
        config: ToolConfig,
        session: SessionState,
        repo_root: PathBuf,
        home: PathBuf,
        adapters: Adapters,
    ) -> Self {
        Self {
            config,
            session,
            repo_root,
            home,
            adapters,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn prompter(&self) -> &dyn Prompter {
        self.adapters.prompter.as_ref()
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.adapters.runner.as_ref()
    }

    // -----------------------------------------------------------------------
    // Preconditions
    // -----------------------------------------------------------------------

    pub fn require_repo_root(&self) -> Result<()> {
        if paths::is_repo_root(&self.repo_root) {
            Ok(())
        } else {
            Err(WorkflowError::NotRepoRoot(self.repo_root.clone()))
        }
    }

    /// The ticket whose branch is checked out, with a copy of its record.
    pub fn current_ticket(&self) -> Result<CurrentTicket> {
        let branch = self.repos().current_branch()?;
        let (id, record) = self.session.ticket_for_branch(&branch)?;
        let record = record.clone();
        Ok(CurrentTicket { id, branch, record })
    }

    // -----------------------------------------------------------------------
    // Adapters
    // -----------------------------------------------------------------------

    pub fn repos(&self) -> Repos<'_> {
        Repos::new(self.runner(), &self.repo_root)
    }

    pub fn git(&self, repo: Repo) -> Git<'_> {
        Git::new(self.runner(), repo, &self.repo_root)
    }

    pub fn evergreen(&self) -> Evergreen<'_> {
        Evergreen::new(self.runner(), &self.repo_root)
    }

    pub fn code_review(&self) -> CodeReviewTool<'_> {
        CodeReviewTool::new(
            self.runner(),
            self.config.python(&self.repo_root),
            self.config.code_review.upload_script(&self.home),
        )
    }

    /// Open `url`, falling back to printing it.
    pub fn open_url(&self, url: &str) {
        tracing::info!("Opening {url}");
        if let Err(e) = self.adapters.browser.open(url) {
            tracing::warn!("{e}");
            println!("Please open {url} manually");
        }
    }

    // -----------------------------------------------------------------------
    // Issue tracker
    // -----------------------------------------------------------------------

    /// Authenticate on first use. Fails only when no credentials work.
    pub fn jira(&mut self) -> Result<&dyn JiraApi> {
        jira_client(&mut self.session, &self.config.jira, &self.adapters)
    }

    fn comment_visibility(&self) -> Visibility {
        Visibility::role(self.config.jira.comment_role.clone())
    }

    /// Best-effort ticket transition, see [`jira::transition`]. Only a
    /// credential failure is returned as an error.
    pub fn transition(
        &mut self,
        ticket: &TicketId,
        expected: Status,
        transition: Transition,
    ) -> Result<Option<Issue>> {
        let client = match jira_client(&mut self.session, &self.config.jira, &self.adapters) {
            Ok(client) => client,
            Err(e) if is_credential_failure(&e) => return Err(e),
            Err(e) => {
                tracing::error!(
                    "Failed to do transition \"{transition}\" for ticket {ticket} due to Jira error: {e}"
                );
                return Ok(None);
            }
        };
        Ok(jira::transition(
            client,
            &self.config.jira.workflow,
            ticket.as_str(),
            expected,
            transition,
        ))
    }

    /// Best-effort comment visible to the configured role.
    pub fn add_comment(&mut self, ticket: &TicketId, body: &str) -> Result<()> {
        let visibility = self.comment_visibility();
        match jira_client(&mut self.session, &self.config.jira, &self.adapters) {
            Ok(client) => {
                jira::add_comment(client, ticket.as_str(), body, Some(&visibility));
                Ok(())
            }
            Err(e) if is_credential_failure(&e) => Err(e),
            Err(e) => {
                tracing::error!(
                    "Failed to add comment \"{body}\" to ticket {ticket} due to Jira error: {e}"
                );
                Ok(())
            }
        }
    }
}
