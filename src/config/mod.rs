//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`PAYCONNECT_BASE_URL`, `PAYCONNECT_PROJECT_ID`,
//!    `PAYCONNECT_PRIVATE_KEY`, `PAYCONNECT_TIMEOUT_SECS`).
//! 2. TOML file specified via --config CLI flag
//! 3. ./payconnect.toml in the current directory
//! 4. `<config dir>/payconnect/payconnect.toml`
//! 5. Built-in defaults

mod defaults;
mod env;
mod loader;
mod resolve;
mod sources;
mod types;

pub use loader::load_config;
pub use resolve::validate_config;
pub use types::{Config, NetworkConfig, RetryConfig};
