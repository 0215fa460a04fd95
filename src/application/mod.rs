// Application layer - Backend access seam and the sync loop built on it
pub mod sync_loop;
pub mod telemetry_api;
