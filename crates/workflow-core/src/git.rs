//! Git operations on one of the two checkouts.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::shell::CommandRunner;
use crate::types::Repo;

pub struct Git<'a> {
    runner: &'a dyn CommandRunner,
    repo: Repo,
    dir: PathBuf,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn CommandRunner, repo: Repo, repo_root: &Path) -> Self {
        Self {
            runner,
            repo,
            dir: repo.dir(repo_root),
        }
    }

    pub fn repo(&self) -> Repo {
        self.repo
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The enterprise module is optional; the community checkout always exists.
    pub fn is_present(&self) -> bool {
        self.repo == Repo::Community || self.dir.is_dir()
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        Ok(self.runner.run(&self.dir, "git", args, None)?.stdout)
    }

    fn run_echo(&self, args: &[&str]) -> Result<()> {
        self.runner.run_interactive(&self.dir, "git", args)
    }

    pub fn current_branch(&self) -> Result<String> {
        Ok(self
            .run(&["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string())
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch])?;
        Ok(())
    }

    /// Create `branch` at HEAD, resetting it if it already exists.
    pub fn new_branch(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", "-B", branch])?;
        Ok(())
    }

    pub fn pull_rebase(&self, branch: &str) -> Result<()> {
        self.run_echo(&["pull", "--rebase", "origin", branch])
    }

    /// Output of `git diff <rev>`, trimmed. Empty means no changes.
    pub fn diff(&self, rev: &str) -> Result<String> {
        Ok(self.run(&["diff", rev])?.trim().to_string())
    }

    pub fn has_changes(&self, rev: &str) -> Result<bool> {
        Ok(!self.diff(rev)?.is_empty())
    }

    pub fn changed_files(&self, rev: &str) -> Result<Vec<String>> {
        Ok(self
            .run(&["diff", "--name-only", rev])?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// `git add -u`: stage modifications to tracked files only.
    pub fn stage_tracked(&self) -> Result<()> {
        self.run_echo(&["add", "-u"])
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_echo(&["commit", "-m", message])
    }

    pub fn head_hash(&self) -> Result<String> {
        Ok(self
            .run(&["rev-parse", "--verify", "HEAD"])?
            .trim()
            .to_string())
    }

    pub fn last_commit_message(&self) -> Result<String> {
        Ok(self.run(&["log", "-1", "--pretty=%B"])?.trim().to_string())
    }

    pub fn delete_branch(&self, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "--delete" };
        self.run(&["branch", flag, branch])?;
        Ok(())
    }
}

/// Both checkouts, community first. Operations skip a missing enterprise
/// module with a debug log.
pub struct Repos<'a> {
    repos: Vec<Git<'a>>,
}

impl<'a> Repos<'a> {
    pub fn new(runner: &'a dyn CommandRunner, repo_root: &Path) -> Self {
        let repos = Repo::all()
            .iter()
            .map(|&repo| Git::new(runner, repo, repo_root))
            .filter(|git| {
                let present = git.is_present();
                if !present {
                    tracing::debug!("{} repo not found at {}, skipping", git.repo(), git.dir().display());
                }
                present
            })
            .collect();
        Self { repos }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Git<'a>> {
        self.repos.iter()
    }

    pub fn community(&self) -> Option<&Git<'a>> {
        self.repos.iter().find(|g| g.repo() == Repo::Community)
    }

    pub fn current_branch(&self) -> Result<String> {
        match self.community() {
            Some(git) => git.current_branch(),
            None => Ok(String::new()),
        }
    }

    /// Check out `branch` everywhere; returns the branch that was current.
    pub fn checkout(&self, branch: &str) -> Result<String> {
        let original = self.current_branch()?;
        for git in self.iter() {
            git.checkout(branch)?;
        }
        Ok(original)
    }

    pub fn new_branch(&self, branch: &str) -> Result<()> {
        for git in self.iter() {
            git.new_branch(branch)?;
        }
        tracing::info!("Created new branch {branch}");
        Ok(())
    }

    /// Pull the latest `branch` into every checkout, then return to the branch
    /// that was current, whether or not the pull succeeded.
    pub fn refresh(&self, branch: &str) -> Result<()> {
        let original = self.checkout(branch)?;
        let pulled = self.iter().try_for_each(|git| git.pull_rebase(branch));
        let restored = self.checkout(&original);
        pulled?;
        restored?;
        tracing::info!("Pulled latest changes from {branch} branch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use tempfile::TempDir;

    fn root_with_enterprise() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(Repo::Enterprise.dir(dir.path())).unwrap();
        dir
    }

    #[test]
    fn enterprise_is_skipped_when_missing() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::default();
        let repos = Repos::new(&runner, dir.path());
        assert_eq!(repos.iter().count(), 1);
        repos.new_branch("server-1").unwrap();
        assert_eq!(runner.commands(), vec!["git checkout -B server-1"]);
    }

    #[test]
    fn refresh_restores_original_branch() {
        let dir = root_with_enterprise();
        let runner = FakeRunner::default().on("git rev-parse --abbrev-ref HEAD", "server-9\n");
        Repos::new(&runner, dir.path()).refresh("master").unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "git rev-parse --abbrev-ref HEAD",
                "git checkout master",
                "git checkout master",
                "git pull --rebase origin master",
                "git pull --rebase origin master",
                "git rev-parse --abbrev-ref HEAD",
                "git checkout server-9",
                "git checkout server-9",
            ]
        );
    }

    #[test]
    fn refresh_restores_branch_after_failed_pull() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::default()
            .on("git rev-parse --abbrev-ref HEAD", "server-9\n")
            .fail("git pull");
        assert!(Repos::new(&runner, dir.path()).refresh("master").is_err());
        assert_eq!(runner.commands().last().unwrap(), "git checkout server-9");
    }

    #[test]
    fn changed_files_splits_lines() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::default().on(
            "git diff --name-only master",
            "src/a.js\n\nsrc/b.cpp\n",
        );
        let git = Git::new(&runner, Repo::Community, dir.path());
        assert_eq!(git.changed_files("master").unwrap(), vec!["src/a.js", "src/b.cpp"]);
    }

    #[test]
    fn delete_branch_flag_depends_on_force() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::default();
        let git = Git::new(&runner, Repo::Community, dir.path());
        git.delete_branch("server-1", false).unwrap();
        git.delete_branch("server-1", true).unwrap();
        assert_eq!(
            runner.commands(),
            vec!["git branch --delete server-1", "git branch -D server-1"]
        );
    }
}
