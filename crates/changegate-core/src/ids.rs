//! Identifiers used to correlate scheduler items, runs and callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the two halves of a [`TrackingKey`].
pub const TRACKING_KEY_SEPARATOR: &str = "#";

/// Separator between the kind prefix and the random part of a token.
pub const TOKEN_SEPARATOR: char = ':';

/// Identity of a scheduler admission unit.
///
/// Assigned before a run exists (the queue id of a free-form job), or
/// derived from the run id for pipeline stages. Stage-scoped ids carry the
/// name of the root stage the change request is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId {
    queue_or_run_id: String,
    job_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
}

impl ExecutionId {
    pub fn new(queue_or_run_id: impl Into<String>, job_url: impl Into<String>) -> Self {
        Self {
            queue_or_run_id: queue_or_run_id.into(),
            job_url: job_url.into(),
            stage: None,
        }
    }

    /// Id of a queued item, keyed by the scheduler's queue id.
    pub fn for_queue_item(queue_id: u64, job_url: impl Into<String>) -> Self {
        Self::new(queue_id.to_string(), job_url)
    }

    /// Same execution, scoped to a (root) stage.
    pub fn scoped_to_stage(&self, stage: impl Into<String>) -> Self {
        Self {
            queue_or_run_id: self.queue_or_run_id.clone(),
            job_url: self.job_url.clone(),
            stage: Some(stage.into()),
        }
    }

    /// Strip the stage scope.
    pub fn unscoped(&self) -> Self {
        Self::new(self.queue_or_run_id.clone(), self.job_url.clone())
    }

    pub fn queue_or_run_id(&self) -> &str {
        &self.queue_or_run_id
    }

    pub fn job_url(&self) -> &str {
        &self.job_url
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    /// True if this id belongs to the same execution as `other`,
    /// regardless of stage scope.
    pub fn same_execution(&self, other: &ExecutionId) -> bool {
        self.queue_or_run_id == other.queue_or_run_id && self.job_url == other.job_url
    }

    pub fn is_empty(&self) -> bool {
        self.queue_or_run_id.is_empty() || self.job_url.is_empty()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.queue_or_run_id, self.job_url)?;
        if let Some(stage) = &self.stage {
            write!(f, "#{}", stage)?;
        }
        Ok(())
    }
}

/// Cache key of a tracking decision: one job run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingKey {
    pub job_full_name: String,
    pub run_id: String,
}

impl TrackingKey {
    pub fn new(job_full_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            job_full_name: job_full_name.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.job_full_name, TRACKING_KEY_SEPARATOR, self.run_id
        )
    }
}

/// Which kind of execution a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    FreeformJob,
    StagedPipeline,
}

impl TokenKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TokenKind::FreeformJob => "freestyle",
            TokenKind::StagedPipeline => "pipeline",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "freestyle" => Some(TokenKind::FreeformJob),
            "pipeline" => Some(TokenKind::StagedPipeline),
            _ => None,
        }
    }
}

/// Single-use correlation secret, formatted `{kind-prefix}:{uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackToken(String);

impl CallbackToken {
    /// Generate a fresh token. Pure: nothing is registered.
    pub fn issue(kind: TokenKind) -> Self {
        Self(format!("{}{}{}", kind.prefix(), TOKEN_SEPARATOR, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> Option<TokenKind> {
        self.0
            .split_once(TOKEN_SEPARATOR)
            .and_then(|(prefix, _)| TokenKind::from_prefix(prefix))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CallbackToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallbackToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_format() {
        let token = CallbackToken::issue(TokenKind::StagedPipeline);
        let (prefix, rest) = token.as_str().split_once(':').unwrap();
        assert_eq!(prefix, "pipeline");
        assert!(Uuid::parse_str(rest).is_ok());
        assert_eq!(token.kind(), Some(TokenKind::StagedPipeline));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = CallbackToken::issue(TokenKind::FreeformJob);
        let b = CallbackToken::issue(TokenKind::FreeformJob);
        assert_ne!(a, b);
    }

    #[test]
    fn test_execution_id_display() {
        let id = ExecutionId::for_queue_item(42, "job/deploy/");
        assert_eq!(id.to_string(), "42/job/deploy/");
        let scoped = id.scoped_to_stage("Release");
        assert_eq!(scoped.to_string(), "42/job/deploy/#Release");
        assert!(scoped.same_execution(&id));
        assert_ne!(scoped, id);
        assert_eq!(scoped.unscoped(), id);
    }

    #[test]
    fn test_empty_execution_id() {
        assert!(ExecutionId::new("", "job/x/").is_empty());
        assert!(!ExecutionId::new("7", "job/x/").is_empty());
    }
}
