use std::path::Path;

use crate::config::schema::{Config, ProviderConfig};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.storage_root.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "storageRoot must not be empty".to_string(),
        });
    }

    validate_provider("vision", &config.providers.vision)?;
    validate_provider("text", &config.providers.text)?;

    let scoring = &config.scoring;
    if !scoring.tag_weight.is_finite() || !scoring.phrase_weight.is_finite() {
        return Err(ConfigError::Validation {
            message: "scoring weights must be finite numbers".to_string(),
        });
    }

    Ok(())
}

fn validate_provider(name: &str, provider: &ProviderConfig) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidProvider {
        name: name.to_string(),
        reason,
    };

    if provider.model.trim().is_empty() {
        return Err(invalid("model must not be empty".to_string()));
    }

    let endpoint = provider.endpoint();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(invalid(format!(
            "endpoint '{}' must be an http(s) URL",
            endpoint
        )));
    }

    Ok(())
}
