//! Configuration loading from files.

use std::path::Path;

use super::{Config, ConfigError};

/// Config file used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "docpress.yaml";

/// Prefix of environment variables that override config values.
///
/// `DOCPRESS_RENDER__MAX_LAYOUT_DEPTH=8` sets `render.max_layout_depth`.
const ENV_PREFIX: &str = "DOCPRESS";

impl Config {
    /// Load the config from the command line argument, defaulting to `docpress.yaml`
    pub async fn load_from_arg(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        Self::load_from_file(&config_file).await
    }

    /// Load the config from a file path
    pub(crate) async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let path_str = path
            .as_os_str()
            .to_str()
            .ok_or_else(|| ConfigError::EncodePath(path.to_path_buf()))?;

        let config = config::Config::builder()
            .add_source(config::File::new(path_str, config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Config>()?;

        config.validate()?;
        Ok(config)
    }
}
