//! Render error types.

use crate::build::database::LookupError;
use crate::build::plugins::PluginError;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("could not find the layout '{selector}' used by {file_path}")]
    MissingLayout { selector: String, file_path: String },

    #[error("failed to look up the layout '{selector}' used by {file_path}: {source}")]
    LayoutLookup {
        selector: String,
        file_path: String,
        source: LookupError,
    },

    #[error("layouts form a cycle: {}", .chain.join(" -> "))]
    LayoutCycle { chain: Vec<String> },

    #[error("invalid render options for {file_path}: {message}")]
    Configuration { file_path: String, message: String },

    #[error("{stage} failed for {file_path} in plugin '{plugin}': {source}")]
    Stage {
        stage: &'static str,
        file_path: String,
        plugin: &'static str,
        source: PluginError,
    },

    #[error("failed to render the layout {layout} around {file_path}: {source}")]
    Layout {
        file_path: String,
        layout: String,
        source: Box<RenderError>,
    },
}

impl RenderError {
    pub fn configuration(file_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            file_path: file_path.into(),
            message: message.into(),
        }
    }

    /// The error beneath any layers of layout rendering.
    #[cfg(test)]
    pub fn innermost(&self) -> &RenderError {
        match self {
            RenderError::Layout { source, .. } => source.innermost(),
            other => other,
        }
    }
}
