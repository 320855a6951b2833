//! Code review uploads through the Rietveld `upload.py` script.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, WorkflowError};
use crate::shell::CommandRunner;

static CREATED_RE: OnceLock<Regex> = OnceLock::new();

fn created_re() -> &'static Regex {
    CREATED_RE.get_or_init(|| Regex::new(r"Issue created\. URL: (\S+)").unwrap())
}

/// Newlines fed to the script so its OAuth prompts fall through to the browser.
const SIMULATED_INPUT: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewTarget {
    New { title: String },
    Existing { issue: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpload {
    pub issue: String,
    /// Only known when the review was just created.
    pub url: Option<String>,
}

impl ReviewUpload {
    pub fn parse_created(stdout: &str) -> Result<Self> {
        let url = created_re()
            .captures(stdout)
            .map(|c| c[1].to_string())
            .ok_or_else(|| WorkflowError::UnexpectedOutput {
                tool: "upload.py".to_string(),
                expected: "an \"Issue created. URL: <url>\" line".to_string(),
            })?;
        let issue = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            issue,
            url: Some(url),
        })
    }
}

pub struct CodeReviewTool<'a> {
    runner: &'a dyn CommandRunner,
    python: PathBuf,
    script: PathBuf,
}

impl<'a> CodeReviewTool<'a> {
    pub fn new(runner: &'a dyn CommandRunner, python: PathBuf, script: PathBuf) -> Self {
        Self {
            runner,
            python,
            script,
        }
    }

    /// Upload the diff of `dir` against `<base>@{upstream}`.
    pub fn upload(&self, dir: &Path, base_branch: &str, target: &ReviewTarget) -> Result<ReviewUpload> {
        let script = self.script.to_string_lossy();
        let rev = format!("{base_branch}@{{upstream}}...");
        let mut args: Vec<&str> = vec![
            &*script,
            "--rev",
            rev.as_str(),
            "--nojira",
            "-y",
            "--git_similarity",
            "90",
            "--check-clang-format",
            "--check-eslint",
        ];
        match target {
            ReviewTarget::Existing { issue } => args.extend(["-i", issue.as_str()]),
            ReviewTarget::New { title } => args.extend(["-t", title.as_str()]),
        }

        tracing::info!("Opening browser to authenticate with OAuth2... ");
        let python = self.python.to_string_lossy();
        let out = self.runner.run(dir, &python, &args, Some(SIMULATED_INPUT))?;
        tracing::debug!("{}", out.stdout.trim_end());

        match target {
            ReviewTarget::Existing { issue } => Ok(ReviewUpload {
                issue: issue.clone(),
                url: None,
            }),
            ReviewTarget::New { .. } => ReviewUpload::parse_created(&out.stdout),
        }
    }
}
