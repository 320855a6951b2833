use crate::error::{Result, WorkflowError};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Repo
// ---------------------------------------------------------------------------

/// The two repositories every ticket touches. The enterprise module is a
/// separate git checkout nested inside the community tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repo {
    Community,
    Enterprise,
}

impl Repo {
    pub fn all() -> &'static [Repo] {
        &[Repo::Community, Repo::Enterprise]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Repo::Community => "community",
            Repo::Enterprise => "enterprise",
        }
    }

    /// Working directory of this repo given the community root.
    pub fn dir(self, repo_root: &Path) -> PathBuf {
        match self {
            Repo::Community => repo_root.to_path_buf(),
            Repo::Enterprise => repo_root.join(paths::ENTERPRISE_REL_PATH),
        }
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TicketId
// ---------------------------------------------------------------------------

pub const DEFAULT_PROJECT: &str = "server";

static TICKET_RE: OnceLock<Regex> = OnceLock::new();
static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn ticket_re() -> &'static Regex {
    TICKET_RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9]*)-([0-9]+)$").unwrap())
}

fn number_re() -> &'static Regex {
    NUMBER_RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

/// An issue-tracker key such as `SERVER-1234`. Always upper case; the git
/// branch for the ticket is the lower-case form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

impl TicketId {
    /// Parse user input: either a bare number (combined with `project`) or a
    /// full `PROJECT-NUMBER` key in any case.
    pub fn parse(input: &str, project: &str) -> Result<Self> {
        let input = input.trim();
        if number_re().is_match(input) {
            return Self::from_key(&format!("{project}-{input}"));
        }
        Self::from_key(input)
    }

    /// The ticket a branch belongs to, if the branch follows the naming scheme.
    pub fn from_branch(branch: &str) -> Option<Self> {
        Self::from_key(branch.trim()).ok()
    }

    fn from_key(key: &str) -> Result<Self> {
        let caps = ticket_re()
            .captures(key)
            .ok_or_else(|| WorkflowError::InvalidTicket(key.to_string()))?;
        Ok(TicketId(format!(
            "{}-{}",
            caps[1].to_ascii_uppercase(),
            &caps[2]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn branch_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TicketId {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_key(&value)
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Jira workflow names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "In Code Review")]
    InCodeReview,
    #[serde(rename = "Closed")]
    Closed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Open => "Open",
            Status::InProgress => "In Progress",
            Status::InCodeReview => "In Code Review",
            Status::Closed => "Closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transition {
    #[serde(rename = "Start Progress")]
    StartProgress,
    #[serde(rename = "Start Code Review")]
    StartCodeReview,
    #[serde(rename = "Close Issue")]
    CloseIssue,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::StartProgress => "Start Progress",
            Transition::StartCodeReview => "Start Code Review",
            Transition::CloseIssue => "Close Issue",
        }
    }

    /// Status an issue lands in after this transition.
    pub fn target(self) -> Status {
        match self {
            Transition::StartProgress => Status::InProgress,
            Transition::StartCodeReview => Status::InCodeReview,
            Transition::CloseIssue => Status::Closed,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
