//! Config-file to runtime-config resolution and validation.

use crate::connector::{ConnectorConfiguration, DeviceMetadata};
use crate::error::ConfigError;

use super::types::{ApiSection, DeviceSection, FileConfig};
use super::{Config, NetworkConfig};

pub(super) fn resolve_config_from_file_config<FEnv>(
    parsed: FileConfig,
    env_lookup: &FEnv,
) -> Result<Config, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    let FileConfig { api, retry, device } = parsed;
    let private_key = resolve_private_key(&api, env_lookup)?;

    let mut connector = ConnectorConfiguration::new(api.base_url.trim(), api.project_id.trim());
    connector.private_key = private_key;
    connector.session_id = normalized_option(&api.session_id);
    connector.locale = normalized_option(&api.locale);

    Ok(Config {
        connector,
        network: NetworkConfig {
            timeout_secs: api.timeout_secs.max(1),
        },
        retry,
        device: resolve_device(device),
    })
}

fn resolve_private_key<FEnv>(
    api: &ApiSection,
    env_lookup: &FEnv,
) -> Result<Option<String>, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    let inline = normalized_option(&api.private_key);
    let env_name = normalized_option(&api.private_key_env);
    match (inline, env_name) {
        (Some(_), Some(_)) => Err(ConfigError::Invalid(
            "only one of api.private_key and api.private_key_env may be set".to_string(),
        )),
        (Some(key), None) => Ok(Some(key)),
        (None, Some(name)) => Ok(env_lookup(&name).as_deref().and_then(normalized_string)),
        (None, None) => Ok(None),
    }
}

fn resolve_device(section: DeviceSection) -> DeviceMetadata {
    let defaults = DeviceMetadata::default();
    DeviceMetadata {
        id: normalized_option(&section.id),
        installation_id: normalized_option(&section.installation_id),
        system_name: defaults.system_name,
        system_version: normalized_option(&section.system_version)
            .unwrap_or(defaults.system_version),
    }
}

/// Reject settings the pipeline cannot run with.
/// Check values that every source, CLI overrides included, must satisfy.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let base_url = &config.connector.base_url;
    if base_url.is_empty() {
        return Err(ConfigError::Invalid("api.base_url must not be empty".to_string()));
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "api.base_url `{base_url}` must start with http:// or https://"
        )));
    }
    config.retry.strategy()?;
    Ok(())
}

pub(super) fn normalized_option(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(normalized_string)
}

pub(super) fn normalized_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
