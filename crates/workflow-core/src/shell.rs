//! Subprocess invocation for the external tools the workflow drives
//! (git, the patch-build CLI, the code-review upload script, linters).
//!
//! Every adapter goes through [`CommandRunner`] so handlers can be exercised
//! against a scripted runner in tests.
//!
//! - `run`: stdout captured and returned, stderr captured for the error.
//! - `run_interactive`: terminal attached, for commands the user watches.
//!
//! A non-zero exit is always an error; callers that tolerate failure match on
//! [`WorkflowError::CommandFailed`].

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Run `program` in `cwd`, feeding `stdin` if given, and capture output.
    fn run(&self, cwd: &Path, program: &str, args: &[&str], stdin: Option<&str>)
        -> Result<CommandOutput>;

    /// Run `program` in `cwd` with the terminal attached.
    fn run_interactive(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<()>;
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Fail with [`WorkflowError::ToolNotFound`] unless `program` resolves on PATH.
pub fn require_tool(program: &str) -> Result<()> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| WorkflowError::ToolNotFound(program.to_string()))
}

/// Runs real processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(cwd: &Path, program: &str, args: &[&str]) -> Result<Command> {
        require_tool(program)?;
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd);
        Ok(cmd)
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> WorkflowError {
    WorkflowError::ToolSpawnFailed {
        program: program.to_string(),
        message: e.to_string(),
    }
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandOutput> {
        let line = display_command(program, args);
        tracing::debug!("running `{line}` in {}", cwd.display());

        let mut cmd = Self::command(cwd, program, args)?;
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;
        if let Some(input) = stdin {
            if let Some(pipe) = child.stdin.as_mut() {
                pipe.write_all(input.as_bytes())
                    .map_err(|e| spawn_error(program, e))?;
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| spawn_error(program, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(WorkflowError::CommandFailed {
                command: line,
                status: output.status.to_string(),
                stderr: stderr.trim().chars().take(2000).collect(),
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }

    fn run_interactive(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<()> {
        let line = display_command(program, args);
        tracing::debug!("running `{line}` in {}", cwd.display());

        let status = Self::command(cwd, program, args)?
            .status()
            .map_err(|e| spawn_error(program, e))?;
        if !status.success() {
            return Err(WorkflowError::CommandFailed {
                command: line,
                status: status.to_string(),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}
