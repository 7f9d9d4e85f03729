pub mod build;
pub mod clean;
pub mod init;
pub mod render;
pub mod run;

use std::path::{Path, PathBuf};

use crate::build::{Builder, base_path_from_config};
use crate::config::{Config, DEFAULT_CONFIG_FILE};

/// Load the config and set up a builder rooted next to it.
pub(crate) async fn load_builder(config_file: Option<&Path>) -> Result<Builder, anyhow::Error> {
    // Determine the config file path
    let config_path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config_path = if config_path.is_relative() {
        std::env::current_dir()?.join(&config_path)
    } else {
        config_path
    };

    let config = Config::load_from_arg(Some(config_path.as_path())).await?;

    // Get the base path for resolving relative paths
    let base_path = base_path_from_config(&config_path);
    Ok(Builder::new(config, base_path)?)
}
