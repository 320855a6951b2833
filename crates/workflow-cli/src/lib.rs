pub mod output;
pub mod root;
pub mod terminal;

use std::path::PathBuf;

use anyhow::Context as _;
use workflow_core::config::ToolConfig;
use workflow_core::context::{Adapters, Context};
use workflow_core::credentials::KeyringStore;
use workflow_core::jira::HttpConnector;
use workflow_core::paths;
use workflow_core::session::SessionState;
use workflow_core::shell::SystemRunner;

use terminal::{DesktopBrowser, InquirePrompter};

/// Load config and session and wire up the real collaborators.
pub fn build_context(repo_root: PathBuf) -> anyhow::Result<Context> {
    let config_dir = paths::config_dir()?;
    let config = ToolConfig::load(&config_dir).context("failed to load config.yaml")?;
    let session = SessionState::load(&paths::session_path(&config_dir));
    let home = paths::home_dir()?;

    let adapters = Adapters {
        runner: Box::new(SystemRunner),
        prompter: Box::new(InquirePrompter),
        secrets: Box::new(KeyringStore),
        connector: Box::new(HttpConnector::new(config.jira.server.clone())),
        browser: Box::new(DesktopBrowser),
    };
    Ok(Context::new(config, session, repo_root, home, adapters))
}
