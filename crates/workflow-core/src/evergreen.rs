//! Patch builds through the `evergreen` command-line client.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Result, WorkflowError};
use crate::shell::CommandRunner;
use crate::types::Repo;

const PROGRAM: &str = "evergreen";

static BUILD_URL_RE: OnceLock<Regex> = OnceLock::new();

fn build_url_re() -> &'static Regex {
    BUILD_URL_RE.get_or_init(|| Regex::new(r"(?m)Build : (\S+)\s*$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchBuild {
    pub id: String,
    pub url: String,
}

impl PatchBuild {
    /// Pull the build URL out of `evergreen patch` output. The patch id is the
    /// last path segment of the URL.
    pub fn parse(stdout: &str) -> Result<Self> {
        let url = build_url_re()
            .captures(stdout)
            .map(|c| c[1].to_string())
            .ok_or_else(|| WorkflowError::UnexpectedOutput {
                tool: "evergreen patch".to_string(),
                expected: "a \"Build : <url>\" line".to_string(),
            })?;
        let id = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(Self { id, url })
    }
}

pub struct Evergreen<'a> {
    runner: &'a dyn CommandRunner,
    community_dir: PathBuf,
    enterprise_dir: PathBuf,
}

impl<'a> Evergreen<'a> {
    pub fn new(runner: &'a dyn CommandRunner, repo_root: &Path) -> Self {
        Self {
            runner,
            community_dir: Repo::Community.dir(repo_root),
            enterprise_dir: Repo::Enterprise.dir(repo_root),
        }
    }

    /// Submit the community checkout as a patch build.
    pub fn start_patch(&self, alias: &str, description: &str, finalize: bool) -> Result<PatchBuild> {
        let mut args = vec![
            "patch",
            "--alias",
            alias,
            "--description",
            description,
            "--yes",
        ];
        if finalize {
            args.push("--finalize");
        }
        let out = self.runner.run(&self.community_dir, PROGRAM, &args, None)?;
        tracing::debug!("{}", out.stdout.trim_end());
        PatchBuild::parse(&out.stdout)
    }

    /// Attach the enterprise checkout to an existing patch as `module`.
    pub fn set_module(&self, patch_id: &str, module: &str) -> Result<()> {
        if !self.enterprise_dir.is_dir() {
            tracing::debug!(
                "enterprise repo not found at {}, not setting module {module}",
                self.enterprise_dir.display()
            );
            return Ok(());
        }
        self.runner.run_interactive(
            &self.enterprise_dir,
            PROGRAM,
            &["patch-set-module", "--id", patch_id, "--module", module, "--yes"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use tempfile::TempDir;

    const PATCH_OUTPUT: &str = "\
Patch successfully created.

     ID : 5d1f0042e3c3317d2a4f1a2b
Created : 1.2s ago
    Description : SERVER-100 speed up the planner
    Build : https://evergreen.mongodb.com/patch/5d1f0042e3c3317d2a4f1a2b
 Status : created
";

    #[test]
    fn parses_build_url_and_id() {
        let build = PatchBuild::parse(PATCH_OUTPUT).unwrap();
        assert_eq!(
            build.url,
            "https://evergreen.mongodb.com/patch/5d1f0042e3c3317d2a4f1a2b"
        );
        assert_eq!(build.id, "5d1f0042e3c3317d2a4f1a2b");
    }

    #[test]
    fn missing_build_line_is_unexpected_output() {
        assert!(matches!(
            PatchBuild::parse("ERROR: not authorized"),
            Err(WorkflowError::UnexpectedOutput { .. })
        ));
    }

    #[test]
    fn finalize_flag_is_optional() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::default().on("evergreen patch", PATCH_OUTPUT);
        let evg = Evergreen::new(&runner, dir.path());
        evg.start_patch("required", "SERVER-1 fix", true).unwrap();
        evg.start_patch("all", "SERVER-1 fix", false).unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                r#"evergreen patch --alias required --description "SERVER-1 fix" --yes --finalize"#,
                r#"evergreen patch --alias all --description "SERVER-1 fix" --yes"#,
            ]
        );
    }

    #[test]
    fn set_module_runs_in_enterprise_dir() {
        let dir = TempDir::new().unwrap();
        let ent = Repo::Enterprise.dir(dir.path());
        std::fs::create_dir_all(&ent).unwrap();
        let runner = FakeRunner::default();
        Evergreen::new(&runner, dir.path())
            .set_module("abc", "enterprise")
            .unwrap();
        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].cwd, ent);
        assert_eq!(
            calls[0].line,
            "evergreen patch-set-module --id abc --module enterprise --yes"
        );
    }
}
