//! services/juris/src/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use crate::ai::AiGateway;
use crate::backend::Backend;
use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Workflows)
//=========================================================================================

/// The shared application state, created once at startup and handed to the
/// shell and every wizard it opens.
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub ai: AiGateway,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(backend: Backend, ai: AiGateway, config: Config) -> Self {
        Self {
            backend,
            ai,
            config: Arc::new(config),
        }
    }
}
