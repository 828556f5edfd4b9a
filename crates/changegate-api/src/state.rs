//! Application state shared across handlers.

use changegate_engine::{ChangeGate, StepMapper};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<ChangeGate>,
    pub mapper: Arc<StepMapper>,
}

impl AppState {
    pub fn new(gate: Arc<ChangeGate>) -> Self {
        let mapper = Arc::new(StepMapper::for_gate(&gate));
        Self { gate, mapper }
    }
}
