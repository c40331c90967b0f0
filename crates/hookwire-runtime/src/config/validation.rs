//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{EventsConfig, HookwireConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HookwireConfig) -> ConfigResult<()> {
    validate_events_config(&config.events)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// The namespace must be `Segment(::Segment)*` where each segment is a
/// script identifier.
fn validate_events_config(events: &EventsConfig) -> ConfigResult<()> {
    let namespace = events.namespace.trim();
    if namespace.is_empty() {
        return Err(ConfigError::missing_field("events.namespace"));
    }

    for segment in namespace.split("::") {
        validate_identifier(namespace, segment)?;
    }
    Ok(())
}

fn validate_identifier(namespace: &str, segment: &str) -> ConfigResult<()> {
    let mut chars = segment.chars();
    match chars.next() {
        None => Err(ConfigError::invalid_namespace(namespace, "empty segment")),
        Some(first) if first.is_ascii_digit() => Err(ConfigError::invalid_namespace(
            namespace,
            format!("segment {segment:?} starts with a digit"),
        )),
        Some(first) => {
            if std::iter::once(first)
                .chain(chars)
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                Ok(())
            } else {
                Err(ConfigError::invalid_namespace(
                    namespace,
                    format!("segment {segment:?} contains characters other than [A-Za-z0-9_]"),
                ))
            }
        }
    }
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}
