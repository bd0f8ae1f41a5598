pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;

use hivejar_control::ControlPlane;
use std::sync::Arc;

/// Shared state handed to every handler. Owns the control plane and the
/// request-independent configuration; hooks (JWKS invalidation, degraded
/// flag) are registered on construction rather than through globals.
pub struct AppState {
    pub control: Arc<ControlPlane>,
    pub config: config::Config,
}
