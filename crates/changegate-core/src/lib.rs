//! changegate core
//!
//! Domain types, wire contracts and port traits shared by the gating
//! engine, the HTTP client for the change-management authority and the
//! callback API. This crate has minimal dependencies and defines the
//! shared vocabulary used across all other crates.

pub mod callback;
pub mod error;
pub mod ids;
pub mod job;
pub mod ports;
pub mod tracking;
pub mod urls;
pub mod wire;

pub use callback::{BlockingCause, CallbackOutcome, CallbackPayload};
pub use error::{Error, Result};
pub use ids::*;
pub use tracking::{FailureReason, TrackingDecision};
