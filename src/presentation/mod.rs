// Presentation layer - Serves the live view to dashboard renderers
pub mod app_state;
pub mod handlers;
