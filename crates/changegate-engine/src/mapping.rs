//! Step-to-stage mapping.

use crate::gate::ChangeGate;
use crate::graph::GraphStore;
use crate::tracking::TrackingResolver;
use changegate_core::job::RunContext;
use changegate_core::ports::ChangeControlAuthority;
use changegate_core::wire::{JobTarget, StageScope, StepMappingRequest};
use changegate_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

const NOT_ASSOCIATED_MESSAGE: &str = "Step could not be associated, check the orchestration \
     pipeline and stage configured in the change management service";

/// A step-mapping request made from inside a stage.
#[derive(Debug, Clone)]
pub struct MappingStep {
    pub stage_name: String,
    pub step_id: Option<String>,
    pub enabled: bool,
    pub ignore_errors: bool,
}

impl MappingStep {
    pub fn new(stage_name: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            step_id: Some(step_id.into()),
            enabled: true,
            ignore_errors: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }
}

/// Associates steps with stages in the change-management authority, at
/// most once per stage per execution.
pub struct StepMapper {
    authority: Arc<dyn ChangeControlAuthority>,
    resolver: Arc<TrackingResolver>,
    graphs: Arc<GraphStore>,
}

impl StepMapper {
    pub fn new(
        authority: Arc<dyn ChangeControlAuthority>,
        resolver: Arc<TrackingResolver>,
        graphs: Arc<GraphStore>,
    ) -> Self {
        Self {
            authority,
            resolver,
            graphs,
        }
    }

    /// Mapper sharing the gate's cache and graphs.
    pub fn for_gate(gate: &ChangeGate) -> Self {
        Self::new(
            gate.authority().clone(),
            gate.resolver().clone(),
            gate.graphs().clone(),
        )
    }

    /// Run the mapping step.
    ///
    /// A disabled step succeeds without any call. Runs that are not known
    /// to be governed return `false` without any call. A failed mapping is
    /// an error unless errors are ignored.
    pub async fn map_step(&self, run: &RunContext, step: &MappingStep) -> Result<bool> {
        if !step.enabled {
            info!(stage = %step.stage_name, "Step association is disabled");
            return Ok(true);
        }
        if !self.resolver.is_tracked_cached(&run.job, &run.run_id) {
            return Ok(false);
        }

        if self.handle_mapping(run, step).await {
            info!(stage = %step.stage_name, "Step associated successfully");
            return Ok(true);
        }

        if step.ignore_errors || run.job.ignore_errors {
            warn!(stage = %step.stage_name, "Step association error ignored");
            Ok(false)
        } else {
            Err(Error::StepMappingFailed(NOT_ASSOCIATED_MESSAGE.to_string()))
        }
    }

    async fn handle_mapping(&self, run: &RunContext, step: &MappingStep) -> bool {
        let graph = self.graphs.get_or_create(&run.execution_id());

        if graph.is_step_associated(&step.stage_name) {
            debug!(stage = %step.stage_name, "Step has been associated already");
            return true;
        }

        let request = StepMappingRequest {
            target: JobTarget {
                job_url: run.job.url.clone(),
                job_name: run.job.name.clone(),
                stage: Some(StageScope {
                    stage_name: step.stage_name.clone(),
                    root: graph.root_summary(&step.stage_name),
                }),
                multi_branch: run.job.multi_branch,
                branch_name: run.branch_name.clone(),
            },
            step_id: step.step_id.clone().filter(|s| !s.is_empty()),
        };

        match self.authority.update_step_mapping(&request).await {
            Ok(true) => {
                if let Err(e) = graph.associate_step(&step.stage_name) {
                    debug!(stage = %step.stage_name, error = %e, "Stage not in graph");
                }
                true
            }
            // No retry: a later step in the same stage tries again.
            Ok(false) => {
                debug!(stage = %step.stage_name, "Step could not be associated");
                false
            }
            Err(failure) => {
                warn!(stage = %step.stage_name, error = %failure, "Step mapping call failed");
                false
            }
        }
    }
}
