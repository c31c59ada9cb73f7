//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and depend only on the driving
//! ports, so they can be tested against mocks.

use std::sync::Arc;

use crate::domain::ports::{ProgressionCommand, ProgressionQuery};

/// Ports the HTTP handlers call.
#[derive(Clone)]
pub struct HttpState {
    pub command: Arc<dyn ProgressionCommand>,
    pub query: Arc<dyn ProgressionQuery>,
}

impl HttpState {
    /// Bundle the command and query ports.
    pub fn new(command: Arc<dyn ProgressionCommand>, query: Arc<dyn ProgressionQuery>) -> Self {
        Self { command, query }
    }
}
