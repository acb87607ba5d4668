pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod types;

// Layered boundaries: use cases and ports, then adapters
pub mod app;
pub mod infra;
