//! changegate client
//!
//! HTTP implementation of the change-management authority port: basic
//! authentication, bounded timeouts, response-envelope parsing and
//! classification of every failure into a [`RemoteFailure`].
//!
//! [`RemoteFailure`]: changegate_core::wire::RemoteFailure

pub mod client;
pub mod config;
pub mod response;

pub use client::{ClientError, HttpAuthority};
pub use config::ClientConfig;
