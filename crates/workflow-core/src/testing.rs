//! In-memory stand-ins for every external collaborator.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::WorkflowTable;
use crate::context::Browser;
use crate::credentials::{Prompter, SecretStore};
use crate::error::{Result, WorkflowError};
use crate::jira::{Credentials, Issue, JiraApi, JiraConnector, JiraError, Visibility};
use crate::shell::{display_command, CommandOutput, CommandRunner};
use crate::types::{Status, Transition};

// ---------------------------------------------------------------------------
// Shared handles
//
// Context owns its collaborators as boxes; tests keep an Rc to inspect them.
// ---------------------------------------------------------------------------

impl<T: JiraApi + ?Sized> JiraApi for Rc<T> {
    fn get_issue(&self, key: &str) -> std::result::Result<Issue, JiraError> {
        (**self).get_issue(key)
    }
    fn transition_issue(&self, key: &str, id: &str) -> std::result::Result<(), JiraError> {
        (**self).transition_issue(key, id)
    }
    fn add_comment(
        &self,
        key: &str,
        body: &str,
        visibility: Option<&Visibility>,
    ) -> std::result::Result<(), JiraError> {
        (**self).add_comment(key, body, visibility)
    }
}

impl<T: SecretStore + ?Sized> SecretStore for Rc<T> {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>> {
        (**self).get(service, username)
    }
    fn set(&self, service: &str, username: &str, secret: &str) -> Result<()> {
        (**self).set(service, username, secret)
    }
    fn delete(&self, service: &str, username: &str) -> Result<()> {
        (**self).delete(service, username)
    }
}

impl<T: Prompter + ?Sized> Prompter for Rc<T> {
    fn text(&self, message: &str) -> Result<String> {
        (**self).text(message)
    }
    fn text_with_default(&self, message: &str, default: &str) -> Result<String> {
        (**self).text_with_default(message, default)
    }
    fn password(&self, message: &str) -> Result<String> {
        (**self).password(message)
    }
    fn pause(&self, message: &str) -> Result<()> {
        (**self).pause(message)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Rc<T> {
    fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandOutput> {
        (**self).run(cwd, program, args, stdin)
    }
    fn run_interactive(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<()> {
        (**self).run_interactive(cwd, program, args)
    }
}

impl<T: Browser + ?Sized> Browser for Rc<T> {
    fn open(&self, url: &str) -> Result<()> {
        (**self).open(url)
    }
}

// ---------------------------------------------------------------------------
// Jira
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeJira {
    issues: RefCell<HashMap<String, Issue>>,
    transitions: RefCell<Vec<(String, String)>>,
    comments: RefCell<Vec<(String, String, Option<Visibility>)>>,
    fail_comments: Cell<bool>,
}

impl FakeJira {
    pub fn with_issue(key: &str, summary: &str, status_id: &str) -> Self {
        let jira = Self::default();
        jira.add_issue(key, summary, status_id);
        jira
    }

    pub fn add_issue(&self, key: &str, summary: &str, status_id: &str) {
        self.issues.borrow_mut().insert(
            key.to_string(),
            Issue {
                key: key.to_string(),
                summary: summary.to_string(),
                status_id: status_id.to_string(),
                status_name: String::new(),
            },
        );
    }

    pub fn status_of(&self, key: &str) -> Option<String> {
        self.issues.borrow().get(key).map(|i| i.status_id.clone())
    }

    /// `(ticket, transition id)` in call order.
    pub fn transitions(&self) -> Vec<(String, String)> {
        self.transitions.borrow().clone()
    }

    /// `(ticket, body)` in call order.
    pub fn comments(&self) -> Vec<(String, String)> {
        self.comments
            .borrow()
            .iter()
            .map(|(k, b, _)| (k.clone(), b.clone()))
            .collect()
    }

    pub fn comment_visibility(&self) -> Vec<Option<Visibility>> {
        self.comments.borrow().iter().map(|(_, _, v)| v.clone()).collect()
    }

    pub fn fail_comments(&self) {
        self.fail_comments.set(true);
    }
}

fn target_status_id(transition_id: &str) -> Option<String> {
    let table = WorkflowTable::default();
    [
        Transition::StartProgress,
        Transition::StartCodeReview,
        Transition::CloseIssue,
    ]
    .into_iter()
    .find(|t| table.transition_id(*t).ok() == Some(transition_id))
    .and_then(|t| table.status_id(t.target()).ok().map(String::from))
}

impl JiraApi for FakeJira {
    fn get_issue(&self, key: &str) -> std::result::Result<Issue, JiraError> {
        self.issues
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| JiraError::Api {
                status: 404,
                message: "Issue Does Not Exist".to_string(),
            })
    }

    fn transition_issue(&self, key: &str, id: &str) -> std::result::Result<(), JiraError> {
        self.transitions
            .borrow_mut()
            .push((key.to_string(), id.to_string()));
        if let (Some(issue), Some(status)) =
            (self.issues.borrow_mut().get_mut(key), target_status_id(id))
        {
            issue.status_id = status;
        }
        Ok(())
    }

    fn add_comment(
        &self,
        key: &str,
        body: &str,
        visibility: Option<&Visibility>,
    ) -> std::result::Result<(), JiraError> {
        if self.fail_comments.get() {
            return Err(JiraError::Transport("connection reset".to_string()));
        }
        self.comments
            .borrow_mut()
            .push((key.to_string(), body.to_string(), visibility.cloned()));
        Ok(())
    }
}

/// Accepts one password (or none), counting every connect attempt.
pub struct FakeConnector {
    jira: Rc<FakeJira>,
    accepted_password: Option<String>,
    rejection: JiraError,
    calls: Cell<u32>,
}

impl FakeConnector {
    pub fn accepting(password: &str) -> Self {
        Self {
            jira: Rc::new(FakeJira::default()),
            accepted_password: Some(password.to_string()),
            rejection: JiraError::Unauthorized,
            calls: Cell::new(0),
        }
    }

    pub fn rejecting(error: JiraError) -> Self {
        Self {
            jira: Rc::new(FakeJira::default()),
            accepted_password: None,
            rejection: error,
            calls: Cell::new(0),
        }
    }

    pub fn with_jira(mut self, jira: Rc<FakeJira>) -> Self {
        self.jira = jira;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl JiraConnector for FakeConnector {
    fn connect(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<Box<dyn JiraApi>, JiraError> {
        self.calls.set(self.calls.get() + 1);
        match &self.accepted_password {
            Some(pwd) if *pwd == credentials.password => Ok(Box::new(Rc::clone(&self.jira))),
            _ => Err(self.rejection.clone()),
        }
    }
}

impl<T: JiraConnector + ?Sized> JiraConnector for Rc<T> {
    fn connect(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<Box<dyn JiraApi>, JiraError> {
        (**self).connect(credentials)
    }
}

// ---------------------------------------------------------------------------
// Secrets and prompts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<(String, String), String>>,
    gets: Cell<u32>,
    sets: Cell<u32>,
    deletes: Cell<u32>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    /// Seed an entry without counting it as a write.
    pub fn insert(&self, service: &str, username: &str, secret: &str) {
        self.entries
            .borrow_mut()
            .insert((service.to_string(), username.to_string()), secret.to_string());
    }

    pub fn stored(&self, service: &str, username: &str) -> Option<String> {
        self.entries
            .borrow()
            .get(&(service.to_string(), username.to_string()))
            .cloned()
    }

    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    pub fn gets(&self) -> u32 {
        self.gets.get()
    }

    pub fn sets(&self) -> u32 {
        self.sets.get()
    }

    pub fn deletes(&self) -> u32 {
        self.deletes.get()
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>> {
        self.gets.set(self.gets.get() + 1);
        Ok(self.stored(service, username))
    }

    fn set(&self, service: &str, username: &str, secret: &str) -> Result<()> {
        self.sets.set(self.sets.get() + 1);
        if self.fail_writes.get() {
            return Err(WorkflowError::SecretStore {
                service: service.to_string(),
                message: "keychain locked".to_string(),
            });
        }
        self.insert(service, username, secret);
        Ok(())
    }

    fn delete(&self, service: &str, username: &str) -> Result<()> {
        self.deletes.set(self.deletes.get() + 1);
        self.entries
            .borrow_mut()
            .remove(&(service.to_string(), username.to_string()));
        Ok(())
    }
}

/// Answers prompts from queues. An empty queue falls back to the catch-all
/// answer if one is set, otherwise the prompt fails.
#[derive(Default)]
pub struct ScriptedPrompter {
    texts: RefCell<VecDeque<String>>,
    passwords: RefCell<VecDeque<String>>,
    fallback: Option<String>,
    messages: RefCell<Vec<String>>,
    text_prompts: Cell<u32>,
    password_prompts: Cell<u32>,
    pauses: Cell<u32>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, answer: &str) -> Self {
        self.texts.borrow_mut().push_back(answer.to_string());
        self
    }

    pub fn with_password(self, answer: &str) -> Self {
        self.passwords.borrow_mut().push_back(answer.to_string());
        self
    }

    pub fn answer_everything(mut self, answer: &str) -> Self {
        self.fallback = Some(answer.to_string());
        self
    }

    fn next(&self, queue: &RefCell<VecDeque<String>>, message: &str) -> Result<String> {
        self.messages.borrow_mut().push(message.to_string());
        queue
            .borrow_mut()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| WorkflowError::Prompt(format!("no scripted answer for {message:?}")))
    }

    pub fn text_prompts(&self) -> u32 {
        self.text_prompts.get()
    }

    pub fn password_prompts(&self) -> u32 {
        self.password_prompts.get()
    }

    pub fn pauses(&self) -> u32 {
        self.pauses.get()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn text(&self, message: &str) -> Result<String> {
        self.text_prompts.set(self.text_prompts.get() + 1);
        self.next(&self.texts, message)
    }

    fn text_with_default(&self, message: &str, default: &str) -> Result<String> {
        let answer = self.text(message)?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    fn password(&self, message: &str) -> Result<String> {
        self.password_prompts.set(self.password_prompts.get() + 1);
        self.next(&self.passwords, message)
    }

    fn pause(&self, message: &str) -> Result<()> {
        self.pauses.set(self.pauses.get() + 1);
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Processes and browser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub cwd: PathBuf,
    pub line: String,
    pub stdin: Option<String>,
    pub interactive: bool,
}

enum Reply {
    Stdout(String),
    Fail,
}

/// Records every command. Replies come from the first rule whose pattern
/// occurs in the rendered command line; unmatched commands succeed silently.
#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<(String, Reply)>,
    invocations: RefCell<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn on(mut self, pattern: &str, stdout: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Stdout(stdout.to_string())));
        self
    }

    pub fn fail(mut self, pattern: &str) -> Self {
        self.rules.push((pattern.to_string(), Reply::Fail));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|i| i.line.clone())
            .collect()
    }

    fn reply(&self, invocation: Invocation) -> Result<CommandOutput> {
        let line = invocation.line.clone();
        self.invocations.borrow_mut().push(invocation);
        match self.rules.iter().find(|(pattern, _)| line.contains(pattern.as_str())) {
            Some((_, Reply::Stdout(out))) => Ok(CommandOutput {
                stdout: out.clone(),
                stderr: String::new(),
            }),
            Some((_, Reply::Fail)) => Err(WorkflowError::CommandFailed {
                command: line,
                status: "exit status: 1".to_string(),
                stderr: "scripted failure".to_string(),
            }),
            None => Ok(CommandOutput::default()),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        cwd: &Path,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandOutput> {
        self.reply(Invocation {
            cwd: cwd.to_path_buf(),
            line: display_command(program, args),
            stdin: stdin.map(String::from),
            interactive: false,
        })
    }

    fn run_interactive(&self, cwd: &Path, program: &str, args: &[&str]) -> Result<()> {
        self.reply(Invocation {
            cwd: cwd.to_path_buf(),
            line: display_command(program, args),
            stdin: None,
            interactive: true,
        })
        .map(|_| ())
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    opened: RefCell<Vec<String>>,
}

impl FakeBrowser {
    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl Browser for FakeBrowser {
    fn open(&self, url: &str) -> Result<()> {
        self.opened.borrow_mut().push(url.to_string());
        Ok(())
    }
}

/// Status ids from the default workflow table, for seeding fake issues.
pub fn status_id(status: Status) -> String {
    WorkflowTable::default()
        .status_id(status)
        .map(String::from)
        .unwrap_or_default()
}
