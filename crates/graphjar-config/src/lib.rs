//! Configuration for graphjar.
//!
//! The configuration is read from a TOML file. Every section is optional and
//! falls back to its defaults; unknown keys are rejected so typos do not go
//! unnoticed.
//!
//! ```toml
//! [logging]
//! level = "graphjar.binary=debug,info"
//!
//! [serialization]
//! back_reference_properties = ["applications", "referenceUsages"]
//!
//! [resolution]
//! max_rounds = 64
//! fail_on_unresolved = true
//!
//! [library]
//! mode = "cached"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;

pub use logging::{init_tracing, LoggingConfig};

/// Tracing target for configuration events.
pub const CONFIG_TARGET: &str = "graphjar.config";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphJarConfig {
    pub logging: LoggingConfig,
    pub serialization: SerializationConfig,
    pub resolution: ResolutionConfig,
    pub library: LibraryConfig,
}

/// Options for the source serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializationConfig {
    /// Property names that are derived from other properties and never
    /// written. They are recomputed after loading.
    pub back_reference_properties: Vec<String>,
}

impl SerializationConfig {
    pub fn default_back_reference_properties() -> Vec<String> {
        [
            "applications",
            "modelElements",
            "referenceUsages",
            "specializations",
            "propertiesFromAssociations",
            "qualifiedPropertiesFromAssociations",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect()
    }

    pub fn is_back_reference(&self, property: &str) -> bool {
        self.back_reference_properties
            .iter()
            .any(|name| name == property)
    }
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            back_reference_properties: Self::default_back_reference_properties(),
        }
    }
}

/// Options for the resolve/populate rounds run after deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Upper bound on resolve/populate rounds for one load.
    pub max_rounds: usize,
    /// Treat references still unresolved once no round makes progress as an
    /// error.
    pub fail_on_unresolved: bool,
}

impl ResolutionConfig {
    pub const DEFAULT_MAX_ROUNDS: usize = 1024;
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
            fail_on_unresolved: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryMode {
    /// Read archive entries on demand.
    #[default]
    Simple,
    /// Read every archive entry into memory when the library is built.
    Cached,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    pub mode: LibraryMode,
    /// Platform version the library validates archives against. Defaults to
    /// [`graphjar_core::PLATFORM_VERSION`].
    pub platform_version: Option<String>,
}

impl LibraryConfig {
    pub fn effective_platform_version(&self) -> Option<&str> {
        match self.platform_version.as_deref() {
            Some(version) if version.trim().is_empty() => None,
            Some(version) => Some(version.trim()),
            None => Some(graphjar_core::PLATFORM_VERSION),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value.message().to_owned())
    }
}

impl GraphJarConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GraphJarConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(
            target: CONFIG_TARGET,
            path = %path.display(),
            mode = ?config.library.mode,
            "loaded config"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution.max_rounds == 0 {
            return Err(ConfigError::Invalid(
                "resolution.max_rounds must be at least 1".to_owned(),
            ));
        }
        if let Some(name) = self
            .serialization
            .back_reference_properties
            .iter()
            .find(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "serialization.back_reference_properties contains an empty name ({name:?})"
            )));
        }
        Ok(())
    }
}
