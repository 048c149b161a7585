//! Handler types and dependencies

use std::sync::Arc;

use crate::download::orchestrator::JobOrchestrator;
use crate::telegram::selection::SelectionStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub orchestrator: Arc<JobOrchestrator>,
    pub selections: Arc<SelectionStore>,
}

impl HandlerDeps {
    pub fn new(orchestrator: Arc<JobOrchestrator>, selections: Arc<SelectionStore>) -> Self {
        Self {
            orchestrator,
            selections,
        }
    }
}
