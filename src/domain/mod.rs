// Domain layer - Telemetry shapes shared by the client, the sync loop and renderers
pub mod dashboard;
pub mod telemetry;
