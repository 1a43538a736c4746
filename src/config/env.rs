//! Environment overrides.
//!
//! `PAYCONNECT_*` variables win over anything read from config files.

use crate::error::ConfigError;

use super::Config;

pub(super) const BASE_URL_ENV: &str = "PAYCONNECT_BASE_URL";
pub(super) const PROJECT_ID_ENV: &str = "PAYCONNECT_PROJECT_ID";
pub(super) const PRIVATE_KEY_ENV: &str = "PAYCONNECT_PRIVATE_KEY";
pub(super) const TIMEOUT_SECS_ENV: &str = "PAYCONNECT_TIMEOUT_SECS";

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty_env(env_lookup, BASE_URL_ENV) {
        config.connector.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(project_id) = non_empty_env(env_lookup, PROJECT_ID_ENV) {
        config.connector.project_id = project_id;
    }
    if let Some(key) = non_empty_env(env_lookup, PRIVATE_KEY_ENV) {
        config.connector.private_key = Some(key);
    }
    if let Some(timeout) = non_empty_env(env_lookup, TIMEOUT_SECS_ENV) {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid {TIMEOUT_SECS_ENV} value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        // Clamp to at least 1 second to avoid accidental "no timeout" behavior.
        config.network.timeout_secs = parsed.max(1);
    }
    Ok(())
}

fn non_empty_env<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
