//! Default configuration constants.
//!
//! Callers share these constants instead of duplicating literals.

/// Default API base URL.
pub(super) const DEFAULT_API_BASE_URL: &str = "https://api.processout.com";
/// Default per-request timeout.
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Local config file name, also used under the global config directory.
pub(super) const CONFIG_FILE_NAME: &str = "payconnect.toml";
/// Directory under the platform config root holding the global config file.
pub(super) const CONFIG_DIR_NAME: &str = "payconnect";

pub(super) const DEFAULT_RETRY_ENABLED: bool = true;
pub(super) const DEFAULT_MAXIMUM_RETRIES: u32 = 3;
pub(super) const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;
pub(super) const DEFAULT_RETRY_RATE: f64 = 3.0;
pub(super) const DEFAULT_RETRY_MINIMUM_MS: u64 = 100;
pub(super) const DEFAULT_RETRY_MAXIMUM_MS: u64 = 10_000;
