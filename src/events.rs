//! Build events consumed from the event bus.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{NotifierError, Result};

/// Identifies a pull request and the endpoint its statuses are posted to.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PullRequestRef {
    pub html_url: String,
    pub statuses_url: String,
}

/// Published by the build system when a build is queued.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BuildEnqueuedEvent {
    #[serde(default)]
    pub pull_request: Option<PullRequestRef>,
}

/// Outcome of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResult {
    Success,
    Failure,
    Error,
}

impl BuildResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "success",
            BuildResult::Failure => "failure",
            BuildResult::Error => "error",
        }
    }
}

impl FromStr for BuildResult {
    type Err = NotifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(BuildResult::Success),
            "failure" => Ok(BuildResult::Failure),
            "error" => Ok(BuildResult::Error),
            other => Err(NotifierError::UnrecognizedResult(other.to_string())),
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published by the build system on completion.
///
/// `result` is kept as sent; [`BuildFinishedEvent::build_result`] checks it.
/// Events without a pull request are skipped before that check happens.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BuildFinishedEvent {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub pull_request: Option<PullRequestRef>,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BuildFinishedEvent {
    pub fn build_result(&self) -> Result<BuildResult> {
        self.result.as_deref().unwrap_or_default().parse()
    }
}

/// A payload that can be decoded from the raw bytes of a bus event.
pub trait EventPayload: Sized {
    fn decode(topic: &str, payload: &[u8]) -> Result<Self>;
}

fn malformed(topic: &str) -> impl FnOnce(serde_json::Error) -> NotifierError + '_ {
    move |source| NotifierError::MalformedPayload {
        topic: topic.to_string(),
        source,
    }
}

impl EventPayload for BuildEnqueuedEvent {
    fn decode(topic: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(malformed(topic))
    }
}

impl EventPayload for BuildFinishedEvent {
    fn decode(topic: &str, payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(malformed(topic))
    }
}
