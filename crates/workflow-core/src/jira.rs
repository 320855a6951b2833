//! Issue-tracker adapter.
//!
//! [`JiraApi`] is the narrow surface the workflow needs: read an issue, apply
//! a transition, post a comment. [`JiraConnector`] turns credentials into an
//! authenticated client and is where authentication failures are detected.
//! The HTTP implementations speak the Jira REST v2 API with basic auth.
//!
//! [`transition`] and [`add_comment`] carry the best-effort contract: remote
//! failures are logged and never abort the workflow step that triggered them.

use std::fmt;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WorkflowTable;
use crate::types::{Status, Transition};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JiraError {
    #[error("Jira rejected the username or password")]
    Unauthorized,

    #[error("CAPTCHA required, please log out and log back into Jira in a browser")]
    Captcha,

    #[error("Jira returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not reach Jira: {0}")]
    Transport(String),

    #[error("unexpected response from Jira: {0}")]
    Decode(String),
}

impl JiraError {
    /// Failures that new credentials could fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, JiraError::Unauthorized | JiraError::Captcha)
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub status_id: String,
    pub status_name: String,
}

/// Restricts who can read a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visibility {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Visibility {
    pub fn role(value: impl Into<String>) -> Self {
        Self {
            kind: "role".to_string(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

pub trait JiraApi {
    fn get_issue(&self, key: &str) -> Result<Issue, JiraError>;
    fn transition_issue(&self, key: &str, transition_id: &str) -> Result<(), JiraError>;
    fn add_comment(
        &self,
        key: &str,
        body: &str,
        visibility: Option<&Visibility>,
    ) -> Result<(), JiraError>;
}

pub trait JiraConnector {
    /// Build a client and verify the credentials against the server.
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn JiraApi>, JiraError>;
}

// ---------------------------------------------------------------------------
// Best-effort operations
// ---------------------------------------------------------------------------

/// Move `ticket` along `transition` only if it currently sits in `expected`.
///
/// Returns the issue with its status updated to the transition's target, or
/// as fetched when the status did not match (a logged no-op). Any remote
/// error is logged and reported as `None`.
pub fn transition(
    client: &dyn JiraApi,
    table: &WorkflowTable,
    ticket: &str,
    expected: Status,
    transition: Transition,
) -> Option<Issue> {
    let ids = table
        .status_id(expected)
        .and_then(|from| Ok((from, table.transition_id(transition)?)));
    let (from_id, transition_id) = match ids {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("cannot transition {ticket}: {e}");
            return None;
        }
    };
    let to = transition.target();

    let mut issue = match client.get_issue(ticket) {
        Ok(issue) => issue,
        Err(e) => {
            tracing::error!(
                "Failed to do transition \"{transition}\" for ticket {ticket} due to Jira error: {e}"
            );
            return None;
        }
    };

    if issue.status_id != from_id {
        tracing::info!("{ticket} is not \"{expected}\", skipping transition to \"{to}\"");
        return Some(issue);
    }

    tracing::info!("Transitioning {ticket} in Jira from \"{expected}\" to \"{to}\"");
    if let Err(e) = client.transition_issue(ticket, transition_id) {
        tracing::error!(
            "Failed to do transition \"{transition}\" for ticket {ticket} due to Jira error: {e}"
        );
        return None;
    }
    if let Ok(to_id) = table.status_id(to) {
        issue.status_id = to_id.to_string();
    }
    issue.status_name = to.to_string();
    Some(issue)
}

/// Post a comment; failures are logged only.
pub fn add_comment(client: &dyn JiraApi, ticket: &str, body: &str, visibility: Option<&Visibility>) {
    if let Err(e) = client.add_comment(ticket, body, visibility) {
        tracing::error!("Failed to add comment \"{body}\" to ticket {ticket} due to Jira error: {e}");
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Deserialize)]
struct RawFields {
    #[serde(default)]
    summary: String,
    status: RawStatus,
}

#[derive(Deserialize)]
struct RawStatus {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct RawErrors {
    #[serde(default, rename = "errorMessages")]
    error_messages: Vec<String>,
}

pub struct HttpJiraClient {
    http: Client,
    server: String,
    credentials: Credentials,
}

impl HttpJiraClient {
    pub fn new(server: &str, credentials: Credentials) -> Result<Self, JiraError> {
        let http = Client::builder()
            .build()
            .map_err(|e| JiraError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.server)
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, JiraError> {
        let resp = req
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| JiraError::Transport(e.to_string()))?;
        check_status(resp)
    }

    /// `GET /myself`: cheapest call that fails on bad credentials.
    pub fn verify(&self) -> Result<(), JiraError> {
        self.send(self.http.get(self.url("myself")))?;
        Ok(())
    }
}

fn check_status(resp: Response) -> Result<Response, JiraError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(JiraError::Unauthorized);
    }
    if status == StatusCode::FORBIDDEN {
        let captcha = resp
            .headers()
            .get("X-Authentication-Denied-Reason")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|reason| reason.to_ascii_uppercase().contains("CAPTCHA"));
        if captcha {
            return Err(JiraError::Captcha);
        }
    }
    let body = resp.text().unwrap_or_default();
    Err(JiraError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<RawErrors>(body) {
        Ok(raw) if !raw.error_messages.is_empty() => raw.error_messages.join("; "),
        _ => body.chars().take(200).collect(),
    }
}

impl JiraApi for HttpJiraClient {
    fn get_issue(&self, key: &str) -> Result<Issue, JiraError> {
        let req = self
            .http
            .get(self.url(&format!("issue/{key}")))
            .query(&[("fields", "summary,status")]);
        let raw: RawIssue = self
            .send(req)?
            .json()
            .map_err(|e| JiraError::Decode(e.to_string()))?;
        Ok(Issue {
            key: raw.key,
            summary: raw.fields.summary,
            status_id: raw.fields.status.id,
            status_name: raw.fields.status.name,
        })
    }

    fn transition_issue(&self, key: &str, transition_id: &str) -> Result<(), JiraError> {
        let body = serde_json::json!({ "transition": { "id": transition_id } });
        let req = self
            .http
            .post(self.url(&format!("issue/{key}/transitions")))
            .json(&body);
        self.send(req)?;
        Ok(())
    }

    fn add_comment(
        &self,
        key: &str,
        body: &str,
        visibility: Option<&Visibility>,
    ) -> Result<(), JiraError> {
        let mut payload = serde_json::json!({ "body": body });
        if let Some(v) = visibility {
            payload["visibility"] =
                serde_json::to_value(v).map_err(|e| JiraError::Decode(e.to_string()))?;
        }
        let req = self
            .http
            .post(self.url(&format!("issue/{key}/comment")))
            .json(&payload);
        self.send(req)?;
        Ok(())
    }
}

/// Connects to a Jira server over HTTP, validating credentials up front.
pub struct HttpConnector {
    server: String,
}

impl HttpConnector {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }
}

impl JiraConnector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn JiraApi>, JiraError> {
        let client = HttpJiraClient::new(&self.server, credentials.clone())?;
        client.verify()?;
        tracing::debug!("authenticated to {} as {}", self.server, credentials.username);
        Ok(Box::new(client))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
