//! changegate engine
//!
//! Decides whether scheduler items and pipeline stages need change-control
//! approval, suspends them while a decision is pending and correlates the
//! asynchronous callback back to the waiting execution.

pub mod config;
pub mod details;
pub mod gate;
pub mod graph;
pub mod mapping;
pub mod registry;
pub mod requeue;
pub mod tracking;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::GateConfig;
pub use gate::{ChangeGate, GateDecision, StageDecision, StageRequest};
pub use graph::{GraphStore, PipelineGraph, PipelineNode, StageInfo};
pub use mapping::{MappingStep, StepMapper};
pub use registry::WebhookRegistry;
pub use requeue::RequeueHelper;
pub use tracking::TrackingResolver;
