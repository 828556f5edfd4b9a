//! Request and response shapes exchanged with the change-management authority.

use crate::ids::CallbackToken;
use crate::job::JobKind;
use crate::urls::{stage_scoped_name, stage_scoped_url};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classified remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConnectionRefused,
    Unauthorized,
    /// The authority does not know the job.
    DetailsNotFound,
    Timeout,
    Malformed,
    Other,
}

/// A remote call that did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct RemoteFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteFailure>;

/// Tri-state answer of the change-control endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlVerdict {
    /// `true`: governance confirmed.
    Governed,
    /// `false`
    NotGoverned,
    /// `unknown`: the authority cannot map the job or stage.
    Unknown,
}

impl ControlVerdict {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Some(ControlVerdict::Governed),
            "false" => Some(ControlVerdict::NotGoverned),
            "unknown" => Some(ControlVerdict::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ControlVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlVerdict::Governed => "true",
            ControlVerdict::NotGoverned => "false",
            ControlVerdict::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// `trackingQuery` input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingQuery {
    pub url: String,
    pub name: String,
    pub pronoun: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    pub is_multi_branch: bool,
}

/// Positive or negative answer of the tracking endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub tracked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_info: Option<serde_json::Value>,
}

/// Summary of a root stage node sent with stage-scoped requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNodeSummary {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub upstream_stage_name: Option<String>,
    #[serde(rename = "upstreamTaskExecutionURL")]
    pub upstream_task_execution_url: Option<String>,
}

/// Stage a request is scoped to, with its root when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageScope {
    pub stage_name: String,
    pub root: Option<RootNodeSummary>,
}

/// Common addressing of a job (optionally one of its stages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    pub job_url: String,
    pub job_name: String,
    pub stage: Option<StageScope>,
    pub multi_branch: bool,
    pub branch_name: Option<String>,
}

impl JobTarget {
    /// `jobName` or `jobName#stage`.
    pub fn scoped_name(&self) -> String {
        match self.stage_name() {
            Some(stage) => stage_scoped_name(&self.job_name, stage),
            None => self.job_name.clone(),
        }
    }

    /// Job URL, stage-scoped when a stage is set.
    pub fn scoped_url(&self) -> String {
        match self.stage_name() {
            Some(stage) => stage_scoped_url(&self.job_url, stage),
            None => self.job_url.clone(),
        }
    }

    /// `(parentStageName, parentStageURL)` when a named root is known.
    pub fn parent_stage(&self) -> Option<(String, String)> {
        let root = self.root()?;
        if root.name.is_empty() {
            return None;
        }
        Some((
            stage_scoped_name(&self.job_name, &root.name),
            stage_scoped_url(&self.job_url, &root.name),
        ))
    }

    pub fn stage_name(&self) -> Option<&str> {
        self.stage
            .as_ref()
            .map(|s| s.stage_name.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn root(&self) -> Option<&RootNodeSummary> {
        self.stage.as_ref().and_then(|s| s.root.as_ref())
    }
}

/// How an execution was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    User,
    Upstream,
    Scm,
    Default,
}

/// Job details attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<TriggerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_build_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_build_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
}

/// `registerAndNotify` input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub token: CallbackToken,
    pub callback_url: String,
    pub target: JobTarget,
    pub job_details: JobDetails,
    pub change_request_details: Option<serde_json::Value>,
}

/// `updateStepMapping` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMappingRequest {
    pub target: JobTarget,
    pub step_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(stage: Option<StageScope>) -> JobTarget {
        JobTarget {
            job_url: "https://ci.example.com/job/app/".into(),
            job_name: "app".into(),
            stage,
            multi_branch: false,
            branch_name: None,
        }
    }

    #[test]
    fn test_unscoped_target() {
        let t = target(None);
        assert_eq!(t.scoped_name(), "app");
        assert_eq!(t.scoped_url(), "https://ci.example.com/job/app/");
        assert!(t.parent_stage().is_none());
    }

    #[test]
    fn test_nested_stage_target() {
        let t = target(Some(StageScope {
            stage_name: "Deploy".into(),
            root: Some(RootNodeSummary {
                id: "3".into(),
                name: "Release".into(),
                parent_id: None,
                upstream_stage_name: None,
                upstream_task_execution_url: None,
            }),
        }));
        assert_eq!(t.scoped_name(), "app#Deploy");
        assert_eq!(
            t.parent_stage(),
            Some((
                "app#Release".to_string(),
                "https://ci.example.com/job/app#Release/".to_string()
            ))
        );
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!(ControlVerdict::parse("TRUE"), Some(ControlVerdict::Governed));
        assert_eq!(ControlVerdict::parse("unknown"), Some(ControlVerdict::Unknown));
        assert_eq!(ControlVerdict::parse("maybe"), None);
    }

    #[test]
    fn test_root_summary_field_names() {
        let root = RootNodeSummary {
            id: "1".into(),
            name: "Release".into(),
            parent_id: None,
            upstream_stage_name: Some("Build".into()),
            upstream_task_execution_url: None,
        };
        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["upstreamStageName"], "Build");
        assert!(json.get("upstreamTaskExecutionURL").is_some());
        assert!(json.get("parentId").is_some());
    }
}
