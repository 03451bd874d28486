pub mod clean;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod error;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod rate_limiter;
pub mod schema;
pub mod types;
