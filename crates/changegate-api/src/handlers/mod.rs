//! Request handlers organized by caller.

pub mod callback;
pub mod executions;
pub mod health;
