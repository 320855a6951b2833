//! Ticket lifecycle handlers, one per command.
//!
//! The happy path for a ticket is
//! `start` → `commit` → `patch` → `review` → `ship` → `cleanup`, with
//! `format`, `delete_branch`, `open_jira` and `status` as helpers.
//!
//! Every handler checks its preconditions (repo root, known branch) before
//! touching git, the issue tracker or the session, so a configuration error
//! leaves everything as it was. Handlers only mutate the in-memory session;
//! the caller saves it once afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codereview::ReviewTarget;
use crate::context::Context;
use crate::error::{Result, WorkflowError};
use crate::evergreen::PatchBuild;
use crate::git::Repos;
use crate::io;
use crate::paths;
use crate::session::{CommitInfo, TicketRecord};
use crate::types::{Repo, Status, TicketId, Transition};

pub const DEFAULT_BASE_BRANCH: &str = "master";

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

/// Begin work on a ticket, or switch back to one already in progress.
pub fn start(ctx: &mut Context, ticket: &str, project: &str, base_branch: &str) -> Result<()> {
    ctx.require_repo_root()?;
    let ticket = TicketId::parse(ticket, project)?;
    let branch = ticket.branch_name();

    if ctx.session.is_in_progress(&ticket) {
        ctx.repos().checkout(&branch)?;
        tracing::info!("Checked out existing branch {branch}");
        return Ok(());
    }

    {
        let repos = ctx.repos();
        repos.refresh(base_branch)?;
        repos.checkout(base_branch)?;
        repos.new_branch(&branch)?;
    }

    // Recorded before talking to Jira so the branch is tracked even if
    // authentication fails.
    ctx.session.start_ticket(
        ticket.clone(),
        TicketRecord::new(base_branch, ticket.as_str()),
    );

    let issue = ctx.transition(&ticket, Status::Open, Transition::StartProgress)?;
    if let Some(issue) = issue.filter(|i| !i.summary.is_empty()) {
        if let Some(record) = ctx.session.ticket_mut(&ticket) {
            record.ticket_summary = issue.summary;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// commit
// ---------------------------------------------------------------------------

/// Format, then commit tracked changes in every repo that has any.
pub fn commit(ctx: &mut Context, message: Option<&str>) -> Result<()> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;

    let message = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => loop {
            let answer = ctx
                .prompter()
                .text("Please enter your commit message (without ticket number): ")?;
            let answer = answer.trim();
            if !answer.is_empty() {
                break answer.to_string();
            }
        },
    };

    format_code(ctx, &current.record.base_branch)?;

    let mut info = CommitInfo::default();
    let result = commit_each(&ctx.repos(), &format!("{} {message}", current.id), &mut info);

    // Hashes of repos that did commit are kept even if a later repo failed.
    if let Some(record) = ctx.session.ticket_mut(&current.id) {
        record.record_commit(info);
    }
    result
}

fn commit_each(repos: &Repos<'_>, message: &str, info: &mut CommitInfo) -> Result<()> {
    for git in repos.iter() {
        if !git.has_changes("HEAD")? {
            tracing::info!("No changes found in repo: {}", git.repo());
            continue;
        }
        git.stage_tracked()?;
        git.commit(message)?;
        info.set(git.repo(), git.head_hash()?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// format
// ---------------------------------------------------------------------------

/// Format modified C++ and JavaScript code in the community repo.
pub fn format(ctx: &Context) -> Result<()> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;
    format_code(ctx, &current.record.base_branch)
}

fn format_code(ctx: &Context, base_branch: &str) -> Result<()> {
    let root = ctx.repo_root();
    let python = ctx.config.python(root);
    let python = python.to_string_lossy();

    let js_files: Vec<String> = ctx
        .git(Repo::Community)
        .changed_files(base_branch)?
        .into_iter()
        .filter(|f| f.ends_with(".js"))
        .collect();

    // With no file arguments eslint would lint the whole tree.
    if !js_files.is_empty() {
        let mut args = vec!["buildscripts/eslint.py", "fix"];
        args.extend(js_files.iter().map(String::as_str));
        ctx.runner().run_interactive(root, &python, &args)?;
    }

    ctx.runner().run_interactive(
        root,
        &python,
        &["buildscripts/clang_format.py", "format-my", base_branch],
    )
}

// ---------------------------------------------------------------------------
// patch
// ---------------------------------------------------------------------------

/// Start a CI patch build of the current branch.
pub fn patch(ctx: &mut Context, finalize: bool, alias: Option<&str>) -> Result<PatchBuild> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;

    if current.record.commits.is_empty() {
        tracing::warn!(
            "Did not find any commits on this branch. Please make sure you run `commit` before `patch`"
        );
    }

    let alias = alias
        .map(String::from)
        .unwrap_or_else(|| ctx.config.evergreen.default_alias.clone());
    let description = ctx.git(Repo::Community).last_commit_message()?;

    let build = ctx.evergreen().start_patch(&alias, &description, finalize)?;
    if let Some(record) = ctx.session.ticket_mut(&current.id) {
        record.record_patch(build.id.clone());
    }
    ctx.evergreen()
        .set_module(&build.id, &ctx.config.evergreen.enterprise_module)?;

    if finalize {
        tracing::info!("Patch build starting at URL: {}", build.url);
        tracing::info!(
            "You can configure Slack and Email notifications for your patch builds at {}",
            ctx.config.evergreen.notifications_url
        );
    } else {
        ctx.open_url(&build.url);
    }
    Ok(build)
}

// ---------------------------------------------------------------------------
// review
// ---------------------------------------------------------------------------

const REVIEW_NOTE: &[&str] = &[
    "",
    "Note: Step 3 (patch build) and Step 4 (code review) may need to be repeated to address",
    "      CR feedback or to validate new changes. Please consult with your mentor on the exact",
    "      workflow for your team.",
    "",
];

/// Open a code review per repo with changes, or upload a new patch set to
/// the existing one.
pub fn review(ctx: &mut Context) -> Result<()> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;
    let base = current.record.base_branch.as_str();

    if current.record.commits.is_empty() {
        tracing::warn!(
            "Did not find any commits on this branch. Please make sure you run `commit` before `review`"
        );
    }

    for &repo in Repo::all() {
        let upload = {
            let git = ctx.git(repo);
            if !git.is_present() {
                continue;
            }
            if !git.has_changes(base)? {
                tracing::info!("There are no changes in the {repo} repository, skipping code review");
                continue;
            }
            tracing::info!("Submitting code review for the {repo} repo");

            let target = match current.record.code_review.get(repo) {
                Some(issue) => ReviewTarget::Existing {
                    issue: issue.to_string(),
                },
                None => ReviewTarget::New {
                    title: review_title(ctx, &current.id, &git.last_commit_message()?)?,
                },
            };
            ctx.code_review().upload(git.dir(), base, &target)?
        };

        if let Some(record) = ctx.session.ticket_mut(&current.id) {
            record.code_review.set(repo, upload.issue.clone());
        }

        match &upload.url {
            Some(url) => {
                tracing::info!("Code review created: {url}");
                ctx.transition(&current.id, Status::InProgress, Transition::StartCodeReview)?;
                ctx.add_comment(&current.id, &format!("Code Review: {url}"))?;
            }
            None => tracing::info!("Code review updated"),
        }
    }

    for line in REVIEW_NOTE {
        tracing::info!("{line}");
    }
    ctx.prompter()
        .pause("Press any key to open the code review app...")?;
    ctx.open_url(&ctx.config.code_review.app_url);
    Ok(())
}

/// The last commit message is the default. A typed title gets the ticket key.
fn review_title(ctx: &Context, ticket: &TicketId, last_commit: &str) -> Result<String> {
    let answer = ctx.prompter().text_with_default(
        "Please enter the title for this code review (without the ticket number).",
        last_commit,
    )?;
    let answer = answer.trim();
    if answer.is_empty() || answer == last_commit {
        Ok(last_commit.to_string())
    } else {
        Ok(format!("{ticket} {answer}"))
    }
}

// ---------------------------------------------------------------------------
// ship
// ---------------------------------------------------------------------------

/// Link the latest patch build on the ticket, refresh the base branch and
/// return the manual push instructions.
pub fn ship(ctx: &mut Context) -> Result<Vec<String>> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;
    let base = current.record.base_branch.clone();

    match current.record.latest_patch() {
        Some(patch_id) => {
            let url = ctx.config.evergreen.patch_url(patch_id);
            ctx.add_comment(&current.id, &format!("Patch Build: {url}"))?;
        }
        None => tracing::warn!(
            "No patch builds were created for this ticket, not adding patch build URL to Jira"
        ),
    }

    // Fails on uncommitted changes in the feature branch.
    ctx.repos().refresh(&base)?;

    Ok(ship_instructions(&base, &current.branch))
}

pub fn ship_instructions(base: &str, branch: &str) -> Vec<String> {
    vec![
        "Please run the following commands to push your changes to the upstream MongoDB repository:".to_string(),
        String::new(),
        format!("    git rebase --interactive {base}"),
        format!("    git checkout {base}"),
        format!("    git merge --ff-only {branch}"),
        format!("    git push origin {base} --dry-run"),
        format!("    git push origin {base}"),
        String::new(),
        "As part of `git rebase --interactive`, you should squash your local commits into one commit. Please refer to".to_string(),
        "this guide for an intro to interactive rebase: https://git-scm.com/docs/git-rebase#_interactive_mode".to_string(),
        String::new(),
        "If you encounter errors during any of the above steps, please ask your mentor for advice.".to_string(),
        String::new(),
        "Finally, when you've pushed your changes, run `workflow zzz` to delete your local branches".to_string(),
    ]
}

// ---------------------------------------------------------------------------
// cleanup
// ---------------------------------------------------------------------------

/// Forget the ticket, delete its local branches and close it in Jira.
pub fn cleanup(ctx: &mut Context, force: bool) -> Result<()> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;
    let base = current.record.base_branch.as_str();
    let branch = current.branch.as_str();

    tracing::info!("🍦 Congrats on completing {}! 🍦", current.id);
    ctx.prompter()
        .pause("Press any key to remove local branches and close the Jira ticket")?;

    for git in ctx.repos().iter() {
        git.checkout(base)?;
        if let Err(e) = git.delete_branch(branch, force) {
            tracing::error!("{e}");
            tracing::error!(
                "Failed to delete branch, please manually delete your local branch {branch} in the {} repo",
                git.repo()
            );
        }
    }

    // Only once the base branch is checked out; a failed checkout must leave
    // the ticket resumable.
    ctx.session.finish_ticket(&current.id);

    ctx.transition(&current.id, Status::InCodeReview, Transition::CloseIssue)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// delete_branch
// ---------------------------------------------------------------------------

/// Force-delete the current ticket branch in both repos and forget it.
pub fn delete_branch(ctx: &mut Context) -> Result<()> {
    ctx.require_repo_root()?;
    let current = ctx.current_ticket()?;

    for git in ctx.repos().iter() {
        git.checkout(&current.record.base_branch)?;
        git.delete_branch(&current.branch, true)?;
    }
    ctx.session.finish_ticket(&current.id);
    tracing::info!("Deleted branch {}", current.branch);
    Ok(())
}

// ---------------------------------------------------------------------------
// open_jira
// ---------------------------------------------------------------------------

/// Open a ticket in the browser; defaults to the checked-out ticket.
pub fn open_jira(ctx: &Context, ticket: Option<&str>, project: &str) -> Result<String> {
    let ticket = match ticket {
        Some(t) => TicketId::parse(t, project)?,
        None => ctx.current_ticket()?.id,
    };
    let url = ctx.config.jira.browse_url(ticket.as_str());
    ctx.open_url(&url);
    Ok(url)
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TicketStatus {
    pub ticket: String,
    pub branch: String,
    pub base_branch: String,
    pub summary: String,
    pub commits: usize,
    pub patch_builds: usize,
    pub latest_patch: Option<String>,
    pub code_reviews: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Every in-progress ticket, sorted by key.
pub fn status(ctx: &Context) -> Vec<TicketStatus> {
    ctx.session
        .tickets()
        .iter()
        .map(|(id, rec)| TicketStatus {
            ticket: id.to_string(),
            branch: id.branch_name(),
            base_branch: rec.base_branch.clone(),
            summary: rec.ticket_summary.clone(),
            commits: rec.commits.len(),
            patch_builds: rec.patch_ids.len(),
            latest_patch: rec.latest_patch().map(|p| ctx.config.evergreen.patch_url(p)),
            code_reviews: Repo::all()
                .iter()
                .filter_map(|&r| rec.code_review.get(r).map(|i| format!("{r}:{i}")))
                .collect(),
            started_at: rec.started_at,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// code
// ---------------------------------------------------------------------------

pub fn code() -> &'static [&'static str] {
    &[
        "I'm afraid I can't do that, Dave.",
        "But do you know about IDL? https://github.com/mongodb/mongo/blob/master/buildscripts/idl/sample/sample.idl",
    ]
}

// ---------------------------------------------------------------------------
// setup
// ---------------------------------------------------------------------------

const SETUP_INSTRUCTIONS: &str = "
Opening browser to configure Evergreen credentials. Please paste the content
of hexadecimal string for the key \"api_key\" in the top left box.

E.g. You will see a text box that resembles the following:

user: \"jane.doe\"
api_key: \"1234567890abcdef123456\"
api_server_host: \"https://evergreen.mongodb.com/api\"
ui_server_host: \"https://evergreen.mongodb.com\"

Please copy and paste the string \"1234567890abcdef123456\" (without quotes). You
may be redirected to a login page first if you're not logged in in your
operating system's default browser.

Press enter to continue...";

pub fn evergreen_yaml(user: &str, api_key: &str) -> String {
    format!(
        "user: \"{user}\"
api_key: \"{api_key}\"
api_server_host: \"https://evergreen.mongodb.com/api\"
ui_server_host: \"https://evergreen.mongodb.com\"

projects:
- name: mongodb-mongo-master
  default: true
  alias: required
  tasks:
  - all
"
    )
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Write `~/.evergreen.yml` for the CI client. Returns false when the file
/// already exists and was left alone.
pub fn setup(ctx: &mut Context) -> Result<bool> {
    let path = paths::evergreen_config_path(ctx.home());
    if path.exists() {
        tracing::warn!("Found existing {}, skipping adding Evergreen configuration", path.display());
        tracing::warn!(
            "Please make sure your Evergreen config file contains your API credentials and \
             a default project configuration of mongodb-mongo-master."
        );
        return Ok(false);
    }

    // Authenticating confirms the username the CI client should use.
    ctx.jira()?;
    let user = ctx
        .session
        .cached_username()
        .map(String::from)
        .ok_or_else(|| WorkflowError::Prompt("no Jira username".to_string()))?;

    ctx.prompter().pause(SETUP_INSTRUCTIONS)?;
    ctx.open_url(&ctx.config.evergreen.settings_url);

    let api_key = loop {
        let answer = ctx
            .prompter()
            .text("Please paste the hexadecimal api_key here (without quotes): ")?;
        let answer = answer.trim();
        if is_hex(answer) {
            break answer.to_string();
        }
        tracing::error!("\"{answer}\" is not a hexadecimal string");
    };

    let written = io::write_if_missing(&path, evergreen_yaml(&user, &api_key).as_bytes())?;
    if written {
        tracing::info!("Wrote Evergreen configuration to {}", path.display());
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// self_update
// ---------------------------------------------------------------------------

pub const CLI_PACKAGE: &str = "workflow-cli";

/// Reinstall the tool from its git source with cargo.
pub fn self_update(ctx: &Context) -> Result<()> {
    let source = ctx.config.update_source.as_str();
    tracing::info!("Installing the latest version from {source}");
    ctx.runner().run_interactive(
        ctx.home(),
        "cargo",
        &["install", "--git", source, "--force", CLI_PACKAGE],
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
