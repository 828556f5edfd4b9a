//! Job, queue item and run descriptions handed to the gate by the scheduler.

use crate::ids::{ExecutionId, TokenKind, TrackingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of execution, as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobKind {
    /// Free-form job.
    Freestyle,
    /// Free-form job built with Maven.
    Maven,
    /// Staged pipeline.
    Pipeline,
    /// Multi-branch pipeline variant.
    MultiBranchPipeline,
    /// Anything the gate does not know about.
    Other(String),
}

impl JobKind {
    /// Whether executions of this kind can be governed at all.
    pub fn supports_governance(&self) -> bool {
        !matches!(self, JobKind::Other(_))
    }

    pub fn is_freeform(&self) -> bool {
        matches!(self, JobKind::Freestyle | JobKind::Maven)
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self, JobKind::Pipeline | JobKind::MultiBranchPipeline)
    }

    pub fn token_kind(&self) -> Option<TokenKind> {
        match self {
            JobKind::Freestyle | JobKind::Maven => Some(TokenKind::FreeformJob),
            JobKind::Pipeline | JobKind::MultiBranchPipeline => Some(TokenKind::StagedPipeline),
            JobKind::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobKind::Freestyle => "freestyle",
            JobKind::Maven => "maven",
            JobKind::Pipeline => "pipeline",
            JobKind::MultiBranchPipeline => "multibranch",
            JobKind::Other(s) => s,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "freestyle" | "project" => JobKind::Freestyle,
            "maven" | "maven project" => JobKind::Maven,
            "pipeline" => JobKind::Pipeline,
            "multibranch" | "multibranch pipeline" => JobKind::MultiBranchPipeline,
            _ => JobKind::Other(s.to_string()),
        };
        Ok(kind)
    }
}

impl From<String> for JobKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<JobKind> for String {
    fn from(kind: JobKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Static description of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Full name including folders.
    pub full_name: String,
    /// Short display name.
    pub name: String,
    /// Absolute job URL.
    pub url: String,
    /// Job URL relative to the scheduler root, used in execution ids.
    pub path: String,
    pub kind: JobKind,
    #[serde(default)]
    pub multi_branch: bool,
    /// Absolute URL of the most recent build, if any.
    #[serde(default)]
    pub last_build_url: Option<String>,
    /// Free-form JSON attached to registrations.
    #[serde(default)]
    pub change_request_details: Option<String>,
    /// Job-level "ignore errors" policy.
    #[serde(default)]
    pub ignore_errors: bool,
}

impl JobMetadata {
    pub fn tracking_key(&self, run_id: &str) -> TrackingKey {
        TrackingKey::new(self.full_name.clone(), run_id)
    }
}

/// Why an execution was triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cause {
    User {
        user_name: String,
        description: String,
    },
    Upstream {
        /// Upstream job URL relative to the scheduler root.
        upstream_url: String,
        upstream_build: u64,
        description: String,
    },
    Scm {
        description: String,
        #[serde(default)]
        scm_type: Option<String>,
    },
    Other {
        description: String,
    },
}

impl Cause {
    pub fn short_description(&self) -> &str {
        match self {
            Cause::User { description, .. }
            | Cause::Upstream { description, .. }
            | Cause::Scm { description, .. }
            | Cause::Other { description } => description,
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Cause::Upstream { .. })
    }
}

/// An item waiting in the scheduler queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    pub job: JobMetadata,
    #[serde(default)]
    pub causes: Vec<Cause>,
}

impl QueueItem {
    pub fn execution_id(&self) -> ExecutionId {
        ExecutionId::for_queue_item(self.id, self.job.path.clone())
    }
}

/// A running execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: String,
    /// Queue id the run was admitted from.
    #[serde(default)]
    pub queue_id: Option<u64>,
    pub job: JobMetadata,
    #[serde(default)]
    pub causes: Vec<Cause>,
    #[serde(default)]
    pub branch_name: Option<String>,
    /// Absolute URL of this run.
    pub build_url: String,
}

impl RunContext {
    /// Run-scoped execution id (pipeline gating).
    pub fn execution_id(&self) -> ExecutionId {
        ExecutionId::new(self.run_id.clone(), self.job.path.clone())
    }

    /// Id of the queue item this run came from (free-form gating).
    pub fn queue_execution_id(&self) -> Option<ExecutionId> {
        self.queue_id
            .map(|id| ExecutionId::for_queue_item(id, self.job.path.clone()))
    }

    pub fn tracking_key(&self) -> TrackingKey {
        self.job.tracking_key(&self.run_id)
    }
}
