//! ConfigLoader: composes config sources and deserializes to OrgTreeConfig.

use super::OrgTreeConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Global config file (`<platform config dir>/config.toml`), if the platform has one
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "orgtree", "orgtree")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration.
    /// Precedence: global file (lowest) -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<OrgTreeConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(global) = Self::global_config_path() {
            builder = builder.add_source(File::from(global).required(false));
        }
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        let builder = Self::with_environment(builder);

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file with environment overlay, ignoring the global file.
    pub fn load_from_file(path: &Path) -> Result<OrgTreeConfig, ConfigError> {
        let builder = Config::builder().add_source(File::from(path).required(true));
        let builder = Self::with_environment(builder);

        builder.build()?.try_deserialize()
    }

    /// Render a configuration as TOML
    pub fn to_toml(config: &OrgTreeConfig) -> Result<String, ConfigError> {
        toml::to_string_pretty(config).map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// ORGTREE__ prefix with __ as separator for nested keys, e.g. `ORGTREE__QUEUE__CAPACITY`.
    fn with_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix("ORGTREE")
                .separator("__")
                .try_parsing(true),
        )
    }
}
