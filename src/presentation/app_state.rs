// Application state for HTTP handlers
use crate::application::sync_loop::DashboardView;
use crate::application::telemetry_api::TelemetryApi;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub view: watch::Receiver<DashboardView>,
    pub stopped: watch::Receiver<bool>,
    pub api: Arc<dyn TelemetryApi>,
}
