//! # Configuration
//!
//! Scene defaults, loaded once at startup from TOML.
//!
//! ```toml
//! initial_entity_capacity = 1024
//! membership = "eager"
//! signature_delimiter = ","
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ecs::DEFAULT_DELIMITER;

/// How a newly registered system learns about entities that already exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipPolicy {
    /// Registration scans every live entity, and fresh entities join systems
    /// with an empty requirement. Matched lists always reflect signatures.
    #[default]
    Eager,
    /// Registration starts with an empty matched list; entities join on their
    /// next component add.
    Lazy,
}

/// Errors raised while loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`EcsConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings applied to every scene a manager creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Entity rows pre-allocated per scene.
    pub initial_entity_capacity: usize,
    /// Matching behaviour on system registration.
    pub membership: MembershipPolicy,
    /// Separator used when building signatures from name lists.
    pub signature_delimiter: char,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 64,
            membership: MembershipPolicy::Eager,
            signature_delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl EcsConfig {
    /// Parses a configuration from TOML text. Missing keys use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Default config with [`MembershipPolicy::Lazy`].
    #[must_use]
    pub fn lazy() -> Self {
        Self {
            membership: MembershipPolicy::Lazy,
            ..Self::default()
        }
    }
}
