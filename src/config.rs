// ABOUTME: Configuration loading for the keepsake binary.
// ABOUTME: Reads KEEPSAKE_* environment variables and resolves the state database location.

use std::path::PathBuf;

use thiserror::Error;

use crate::commands::DumpFormat;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KEEPSAKE_FORMAT must be \"json\" or \"yaml\", got {0:?}")]
    InvalidFormat(String),
}

/// Binary configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct KeepsakeConfig {
    pub home: PathBuf,
    pub state_path: PathBuf,
    pub format: DumpFormat,
}

impl KeepsakeConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - KEEPSAKE_HOME: data directory (default: ~/.keepsake)
    /// - KEEPSAKE_STATE: state database path (default: $KEEPSAKE_HOME/state.db)
    /// - KEEPSAKE_FORMAT: default dump format, json or yaml (default: json)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let home = lookup("KEEPSAKE_HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                lookup("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".keepsake")
            });

        let state_path = lookup("KEEPSAKE_STATE")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("state.db"));

        let format = match lookup("KEEPSAKE_FORMAT").as_deref() {
            None | Some("") | Some("json") => DumpFormat::Json,
            Some("yaml") => DumpFormat::Yaml,
            Some(other) => return Err(ConfigError::InvalidFormat(other.to_string())),
        };

        Ok(Self {
            home,
            state_path,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<KeepsakeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        KeepsakeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn config_loads_defaults() {
        let config = load(&[("HOME", "/home/user")]).unwrap();

        assert_eq!(config.home, PathBuf::from("/home/user/.keepsake"));
        assert_eq!(config.state_path, PathBuf::from("/home/user/.keepsake/state.db"));
        assert_eq!(config.format, DumpFormat::Json);
    }

    #[test]
    fn config_falls_back_to_tmp_without_home() {
        let config = load(&[]).unwrap();
        assert_eq!(config.home, PathBuf::from("/tmp/.keepsake"));
    }

    #[test]
    fn config_state_path_overrides_home() {
        let config = load(&[
            ("KEEPSAKE_HOME", "/srv/keepsake"),
            ("KEEPSAKE_STATE", "/var/lib/state.db"),
            ("KEEPSAKE_FORMAT", "yaml"),
        ])
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/srv/keepsake"));
        assert_eq!(config.state_path, PathBuf::from("/var/lib/state.db"));
        assert_eq!(config.format, DumpFormat::Yaml);
    }

    #[test]
    fn config_rejects_unknown_format() {
        let err = load(&[("KEEPSAKE_FORMAT", "toml")]).unwrap_err();
        assert!(
            err.to_string().contains("KEEPSAKE_FORMAT"),
            "error should name the variable: {}",
            err
        );
    }
}
