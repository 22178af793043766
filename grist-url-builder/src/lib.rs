pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use services::GristClient;
use std::sync::Arc;

/// Shared application state. Holds no mutable data.
#[derive(Clone)]
pub struct AppState {
    pub grist: Arc<GristClient>,
}

impl AppState {
    pub fn new(grist: Arc<GristClient>) -> Self {
        Self { grist }
    }
}
