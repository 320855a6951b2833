use std::path::PathBuf;

use thiserror::Error;

use crate::jira::JiraError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(
        "not the root of the mongo repository: no SConstruct in {0}\n\
         Please run this command from the root of the mongo repository"
    )]
    NotRepoRoot(PathBuf),

    #[error("unknown branch \"{0}\": please ensure the branch is created with the \"start\" command")]
    UnknownBranch(String),

    #[error("invalid ticket '{0}': expected a ticket number like 1234 or SERVER-1234")]
    InvalidTicket(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no {kind} id configured for '{name}'")]
    UnmappedWorkflowName { kind: &'static str, name: String },

    #[error(
        "could not authenticate with {service} after {attempts} attempts; \
         check your username and password, or log out and back into Jira in a browser if a CAPTCHA is required"
    )]
    AuthRetriesExhausted { service: String, attempts: u32 },

    #[error("secret store error for {service}: {message}")]
    SecretStore { service: String, message: String },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("required tool '{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("failed to start '{program}': {message}")]
    ToolSpawnFailed { program: String, message: String },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("could not find {expected} in the output of {tool}")]
    UnexpectedOutput { tool: String, expected: String },

    #[error("failed to open {url} in a browser: {message}")]
    Browser { url: String, message: String },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Jira(#[from] JiraError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl WorkflowError {
    /// Errors caused by how the tool was invoked rather than by a failing
    /// collaborator. Handlers raise these before mutating any state.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WorkflowError::NotRepoRoot(_)
                | WorkflowError::UnknownBranch(_)
                | WorkflowError::InvalidTicket(_)
                | WorkflowError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
