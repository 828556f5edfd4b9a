//! Pipeline node graph.
//!
//! One graph per execution holds the stage tree. Each node records the name
//! of its root stage, resolved once when the node is added, so lookups never
//! chain through intermediate parents.

use changegate_core::wire::RootNodeSummary;
use changegate_core::{Error, ExecutionId, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Stage as reported by the stage-status listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub upstream_stage_name: Option<String>,
    #[serde(default)]
    pub upstream_task_execution_url: Option<String>,
}

impl StageInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_upstream(mut self, stage_name: impl Into<String>, url: impl Into<String>) -> Self {
        self.upstream_stage_name = Some(stage_name.into());
        self.upstream_task_execution_url = Some(url.into());
        self
    }
}

/// A stage in an execution's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    /// Name of the root stage. `None` when this node is a root.
    pub root: Option<String>,
    pub upstream_stage_name: Option<String>,
    pub upstream_task_execution_url: Option<String>,
    pub change_control_in_progress: bool,
    pub step_associated: bool,
}

impl PipelineNode {
    pub fn is_root(&self) -> bool {
        self.root.is_none()
    }

    pub fn summary(&self) -> RootNodeSummary {
        RootNodeSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            parent_id: self.parent_id.clone(),
            upstream_stage_name: self.upstream_stage_name.clone(),
            upstream_task_execution_url: self.upstream_task_execution_url.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct GraphInner {
    nodes_by_name: HashMap<String, PipelineNode>,
    names_by_id: HashMap<String, String>,
    current_stage: Option<String>,
}

impl GraphInner {
    fn node_mut(&mut self, stage_name: &str) -> Result<&mut PipelineNode> {
        self.nodes_by_name
            .get_mut(stage_name)
            .ok_or_else(|| Error::StageNotFound(stage_name.to_string()))
    }

    fn root_of(&self, stage_name: &str) -> Option<&PipelineNode> {
        let node = self.nodes_by_name.get(stage_name)?;
        match &node.root {
            Some(root) => self.nodes_by_name.get(root),
            None => Some(node),
        }
    }
}

/// Stage tree of one execution.
#[derive(Debug, Default)]
pub struct PipelineGraph {
    inner: Mutex<GraphInner>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GraphInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a stage. Re-adding a known stage returns the existing node untouched.
    pub fn add_stage(&self, stage: StageInfo) -> PipelineNode {
        let mut inner = self.lock();
        if let Some(existing) = inner.nodes_by_name.get(&stage.name) {
            return existing.clone();
        }

        let root = stage
            .parent_id
            .as_ref()
            .and_then(|parent_id| inner.names_by_id.get(parent_id))
            .and_then(|parent_name| inner.nodes_by_name.get(parent_name))
            .map(|parent| parent.root.clone().unwrap_or_else(|| parent.name.clone()));

        let node = PipelineNode {
            id: stage.id,
            name: stage.name,
            parent_id: stage.parent_id,
            root,
            upstream_stage_name: stage.upstream_stage_name,
            upstream_task_execution_url: stage.upstream_task_execution_url,
            change_control_in_progress: false,
            step_associated: false,
        };
        debug!(stage = %node.name, root = ?node.root, "Stage added");

        inner.names_by_id.insert(node.id.clone(), node.name.clone());
        inner.nodes_by_name.insert(node.name.clone(), node.clone());
        node
    }

    pub fn node_by_name(&self, stage_name: &str) -> Option<PipelineNode> {
        self.lock().nodes_by_name.get(stage_name).cloned()
    }

    /// The stage's root node, itself when it has none, `None` when unknown.
    pub fn resolve_root(&self, stage_name: &str) -> Option<PipelineNode> {
        self.lock().root_of(stage_name).cloned()
    }

    /// Mark a step as associated with the stage. Returns `true` only the
    /// first time.
    pub fn associate_step(&self, stage_name: &str) -> Result<bool> {
        let mut inner = self.lock();
        let node = inner.node_mut(stage_name)?;
        if node.step_associated {
            return Ok(false);
        }
        node.step_associated = true;
        Ok(true)
    }

    pub fn is_step_associated(&self, stage_name: &str) -> bool {
        self.lock()
            .nodes_by_name
            .get(stage_name)
            .is_some_and(|n| n.step_associated)
    }

    /// Mark change control in progress. Returns `true` only the first time.
    pub fn mark_change_control_in_progress(&self, stage_name: &str) -> Result<bool> {
        let mut inner = self.lock();
        let node = inner.node_mut(stage_name)?;
        if node.change_control_in_progress {
            return Ok(false);
        }
        node.change_control_in_progress = true;
        Ok(true)
    }

    pub fn is_change_control_in_progress(&self, stage_name: &str) -> bool {
        self.lock()
            .nodes_by_name
            .get(stage_name)
            .is_some_and(|n| n.change_control_in_progress)
    }

    /// Record the stage currently executing.
    pub fn set_current_stage(&self, stage_name: &str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.nodes_by_name.contains_key(stage_name) {
            return Err(Error::StageNotFound(stage_name.to_string()));
        }
        inner.current_stage = Some(stage_name.to_string());
        Ok(())
    }

    pub fn current_stage(&self) -> Option<PipelineNode> {
        let inner = self.lock();
        inner
            .current_stage
            .as_ref()
            .and_then(|name| inner.nodes_by_name.get(name))
            .cloned()
    }

    pub fn is_change_step_in_progress(&self) -> bool {
        self.current_stage()
            .is_some_and(|n| n.change_control_in_progress)
    }

    /// Mark change control in progress on the current stage.
    pub fn mark_change_step_in_progress(&self) -> Result<bool> {
        let current = self
            .lock()
            .current_stage
            .clone()
            .ok_or_else(|| Error::StageNotFound("no current stage".to_string()))?;
        self.mark_change_control_in_progress(&current)
    }

    /// Summary of the stage's root, as sent with stage-scoped requests.
    pub fn root_summary(&self, stage_name: &str) -> Option<RootNodeSummary> {
        self.lock().root_of(stage_name).map(PipelineNode::summary)
    }

    pub fn len(&self) -> usize {
        self.lock().nodes_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Graphs of all live executions.
#[derive(Debug, Default)]
pub struct GraphStore {
    graphs: DashMap<ExecutionId, Arc<PipelineGraph>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, execution_id: &ExecutionId) -> Arc<PipelineGraph> {
        self.graphs
            .entry(execution_id.unscoped())
            .or_default()
            .clone()
    }

    pub fn get(&self, execution_id: &ExecutionId) -> Option<Arc<PipelineGraph>> {
        self.graphs
            .get(&execution_id.unscoped())
            .map(|g| g.clone())
    }

    pub fn remove(&self, execution_id: &ExecutionId) -> Option<Arc<PipelineGraph>> {
        self.graphs
            .remove(&execution_id.unscoped())
            .map(|(_, g)| g)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
