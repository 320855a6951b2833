pub mod codereview;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod evergreen;
pub mod git;
pub mod io;
pub mod jira;
pub mod lifecycle;
pub mod paths;
pub mod session;
pub mod shell;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, WorkflowError};
