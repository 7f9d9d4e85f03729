//! Configuration loading and types for docpress.
//!
//! - Type definitions for config structures (`types`)
//! - Loading configs from files and the environment (`load`)

mod load;
mod types;

use std::path::PathBuf;

pub use load::DEFAULT_CONFIG_FILE;
pub use types::{ActionsConfig, Config, MarkdownConfig, PathsConfig, RenderConfig, SiteConfig};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config path is not valid UTF-8: {0}")]
    EncodePath(PathBuf),

    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("{0}")]
    Validation(String),
}

impl Config {
    /// A default config for a new project.
    pub fn default_for(name: &str) -> Self {
        Self {
            site: SiteConfig {
                name: name.to_string(),
                url: None,
            },
            ..Default::default()
        }
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.name.trim().is_empty() {
            return Err(ConfigError::Validation("site.name must not be empty".to_string()));
        }
        if self.render.max_layout_depth == 0 {
            return Err(ConfigError::Validation(
                "render.max_layout_depth must be at least 1".to_string(),
            ));
        }
        if self.paths.documents.is_empty() {
            return Err(ConfigError::Validation(
                "paths.documents must name at least one directory".to_string(),
            ));
        }
        Ok(())
    }
}
