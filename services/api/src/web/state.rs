//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use contract_analysis_core::ports::{ContractExtractionService, DatabaseService};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub extractor: Arc<dyn ContractExtractionService>,
    pub config: Arc<Config>,
}
