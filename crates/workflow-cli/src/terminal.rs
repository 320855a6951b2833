//! Terminal and desktop implementations of the core's interactive seams.

use inquire::error::InquireError;
use inquire::{Password, PasswordDisplayMode, Text};
use workflow_core::context::Browser;
use workflow_core::credentials::Prompter;
use workflow_core::{Result, WorkflowError};

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct InquirePrompter;

fn prompt_error(e: InquireError) -> WorkflowError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            WorkflowError::Prompt("cancelled by user".to_string())
        }
        InquireError::NotTTY => {
            WorkflowError::Prompt("input required but stdin is not a terminal".to_string())
        }
        other => WorkflowError::Prompt(other.to_string()),
    }
}

impl Prompter for InquirePrompter {
    fn text(&self, message: &str) -> Result<String> {
        Text::new(message).prompt().map_err(prompt_error)
    }

    fn text_with_default(&self, message: &str, default: &str) -> Result<String> {
        Text::new(message)
            .with_default(default)
            .prompt()
            .map_err(prompt_error)
    }

    fn password(&self, message: &str) -> Result<String> {
        Password::new(message)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Hidden)
            .prompt()
            .map_err(prompt_error)
    }

    fn pause(&self, message: &str) -> Result<()> {
        Text::new(message).prompt().map(|_| ()).map_err(prompt_error)
    }
}

/// Opens URLs with the desktop's default handler.
#[derive(Debug, Default)]
pub struct DesktopBrowser;

impl Browser for DesktopBrowser {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url).map_err(|e| WorkflowError::Browser {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
