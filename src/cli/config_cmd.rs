//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;
use crate::domain::recording::{ByteSize, Duration, OutputFormat};

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    apply_config_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;

    match config_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            config_value(&config, key).as_deref().unwrap_or(NOT_SET),
        );
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn config_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "format" => config.format.clone(),
        "high_quality" => config.high_quality.map(|b| b.to_string()),
        "max_file_size" => config.max_file_size.clone(),
        "recordings_dir" => config.recordings_dir.clone(),
        "low_storage_threshold" => config.low_storage_threshold.clone(),
        "notify" => config.notify.map(|b| b.to_string()),
        _ => None,
    }
}

fn apply_config_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "format" => config.format = Some(value.to_lowercase()),
        "high_quality" => config.high_quality = Some(parse_bool_for(key, value)?),
        "max_file_size" => config.max_file_size = Some(value.to_string()),
        "recordings_dir" => config.recordings_dir = Some(value.to_string()),
        "low_storage_threshold" => config.low_storage_threshold = Some(value.to_string()),
        "notify" => config.notify = Some(parse_bool_for(key, value)?),
        _ => return check_key(key),
    }
    Ok(())
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::ValidationError {
        key: key.to_string(),
        message,
    };
    match key {
        "format" => {
            value
                .parse::<OutputFormat>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "max_file_size" => {
            value
                .parse::<ByteSize>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "low_storage_threshold" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(e.to_string()))?;
        }
        "high_quality" | "notify" => {
            parse_bool_for(key, value)?;
        }
        "recordings_dir" => {
            if value.trim().is_empty() {
                return Err(invalid("Directory must not be empty".to_string()));
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_bool_for(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).map_err(|_| ConfigError::ValidationError {
        key: key.to_string(),
        message: "Value must be 'true' or 'false'".to_string(),
    })
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("false"), Ok(false));
        assert_eq!(parse_bool("yes"), Ok(true));
        assert_eq!(parse_bool("no"), Ok(false));
        assert_eq!(parse_bool("1"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("invalid").is_err());
    }

    #[test]
    fn validate_format() {
        assert!(validate_config_value("format", "wav").is_ok());
        assert!(validate_config_value("format", "FLAC").is_ok());
        assert!(validate_config_value("format", "mp3").is_err());
    }

    #[test]
    fn validate_sizes_and_durations() {
        assert!(validate_config_value("max_file_size", "10MB").is_ok());
        assert!(validate_config_value("max_file_size", "0").is_err());
        assert!(validate_config_value("low_storage_threshold", "30m").is_ok());
        assert!(validate_config_value("low_storage_threshold", "soon").is_err());
    }

    #[test]
    fn validate_booleans_and_dir() {
        assert!(validate_config_value("high_quality", "yes").is_ok());
        assert!(validate_config_value("notify", "maybe").is_err());
        assert!(validate_config_value("recordings_dir", "  ").is_err());
        assert!(validate_config_value("recordings_dir", "/tmp/rec").is_ok());
    }

    #[test]
    fn apply_then_read_back() {
        let mut config = AppConfig::empty();
        apply_config_value(&mut config, "format", "FLAC").unwrap();
        apply_config_value(&mut config, "high_quality", "1").unwrap();
        apply_config_value(&mut config, "max_file_size", "5MB").unwrap();

        assert_eq!(config_value(&config, "format").as_deref(), Some("flac"));
        assert_eq!(config_value(&config, "high_quality").as_deref(), Some("true"));
        assert_eq!(config_value(&config, "max_file_size").as_deref(), Some("5MB"));
        assert!(config_value(&config, "notify").is_none());
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(matches!(
            check_key("api_key"),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
