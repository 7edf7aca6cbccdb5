// Copyright 2025 Cowboy AI, LLC.

//! Application configuration
//!
//! Plain serde structures; the runtime reads no files or environment
//! variables itself.

use serde::{Deserialize, Serialize};

/// Mode the application runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationMode {
    /// Local development
    Development,
    /// Automated tests
    Test,
    /// Pre-production
    Staging,
    /// Production
    #[default]
    Production,
}

/// Options of a unit of work, attached to its meta info or to its usecase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitOfWorkOptions {
    /// Evict unmodified loaded entities when the unit of work is paused
    pub prune_on_pause: bool,
}

impl UnitOfWorkOptions {
    /// Options with pruning on pause enabled
    pub fn prune_on_pause() -> Self {
        Self {
            prune_on_pause: true,
        }
    }
}

/// Settings seeding an application assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
    /// Run mode
    pub mode: ApplicationMode,
    /// Default options for units of work
    pub unit_of_work: UnitOfWorkOptions,
    /// Add the support layer with default identity generation and value
    /// serialization when some module cannot see one
    pub spi_defaults: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Application".to_string(),
            version: "1.0".to_string(),
            mode: ApplicationMode::default(),
            unit_of_work: UnitOfWorkOptions::default(),
            spi_defaults: true,
        }
    }
}

impl ApplicationConfig {
    /// Configuration with a name and defaults otherwise
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApplicationConfig::default();
        assert_eq!(config.mode, ApplicationMode::Production);
        assert!(config.spi_defaults);
        assert!(!config.unit_of_work.prune_on_pause);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = ApplicationConfig::from_json(
            r#"{"name": "Library", "mode": "test", "unit_of_work": {"prune_on_pause": true}}"#,
        )
        .unwrap();
        assert_eq!(config.name, "Library");
        assert_eq!(config.version, "1.0");
        assert_eq!(config.mode, ApplicationMode::Test);
        assert!(config.unit_of_work.prune_on_pause);
        assert!(config.spi_defaults);
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(ApplicationConfig::from_json(r#"{"mode": "chaos"}"#).is_err());
    }
}
