//! Tracing setup.
//!
//! Console subscriber driven by `RUST_LOG`, defaulting to `info`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use slicer_engine::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry();
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_telemetry() {
    let is_development = std::env::var("ENVIRONMENT")
        .map(|v| v == "development")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(!is_development)
        .with_ansi(is_development)
        .try_init();
}
