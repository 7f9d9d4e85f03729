//! Render plugins.
//!
//! A plugin converts content from one extension to the next in a document's
//! extension chain, and may also post-process a whole document once its
//! chain has run. Plugins are consulted in registration order.
//!
//! # Adding a Plugin
//!
//! ```ignore
//! struct ShoutPlugin;
//!
//! #[async_trait]
//! impl RenderPlugin for ShoutPlugin {
//!     fn name(&self) -> &'static str { "shout" }
//!     fn converts(&self, in_ext: &str, _out_ext: Option<&str>) -> bool { in_ext == "shout" }
//!     async fn render(&self, event: &mut RenderEvent<'_>) -> Result<(), PluginError> {
//!         event.content = event.content.to_uppercase();
//!         Ok(())
//!     }
//! }
//!
//! registry.register(ShoutPlugin);
//! ```

mod markdown;
mod tera;

use std::sync::Arc;

use async_trait::async_trait;

use super::document::Document;
use super::highlight::SyntaxHighlighter;
use super::template_data::TemplateData;
use crate::config::Config;

pub use self::markdown::{MarkdownError, MarkdownPlugin};
pub use self::tera::TeraPlugin;

/// Error returned by a plugin hook.
pub type PluginError = Box<dyn std::error::Error + Send + Sync>;

/// A plugin hook failed.
#[derive(thiserror::Error, Debug)]
#[error("plugin '{plugin}' failed: {source}")]
pub struct PluginFailure {
    pub plugin: &'static str,
    pub source: PluginError,
}

/// One step of an extension chain.
pub struct RenderEvent<'a> {
    pub in_extension: &'a str,
    /// `None` for the terminal step of a single-extension document.
    pub out_extension: Option<&'a str>,
    pub template_data: &'a TemplateData,
    pub document: &'a Document,
    /// The content to convert. Plugins replace it with their output.
    pub content: String,
}

/// The whole-document hook, run after the extension chain.
pub struct RenderDocumentEvent<'a> {
    /// The first (outermost) extension of the document.
    pub extension: Option<&'a str>,
    pub template_data: &'a TemplateData,
    pub document: &'a Document,
    pub content: String,
}

#[async_trait]
pub trait RenderPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this plugin handles the `in_extension` → `out_extension` step.
    fn converts(&self, _in_extension: &str, _out_extension: Option<&str>) -> bool {
        false
    }

    async fn render(&self, _event: &mut RenderEvent<'_>) -> Result<(), PluginError> {
        Ok(())
    }

    async fn render_document(&self, _event: &mut RenderDocumentEvent<'_>) -> Result<(), PluginError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn RenderPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in Markdown and Tera plugins.
    pub fn with_defaults(config: &Config) -> Result<Self, MarkdownError> {
        let highlighter = SyntaxHighlighter::new(&config.render.highlight_theme);
        let mut registry = Self::new();
        registry.register(MarkdownPlugin::new(&config.markdown, highlighter)?);
        registry.register(TeraPlugin);
        Ok(registry)
    }

    pub fn register<P: RenderPlugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    /// Offer a chain step to every plugin that converts it.
    pub async fn trigger_render(&self, event: &mut RenderEvent<'_>) -> Result<(), PluginFailure> {
        for plugin in &self.plugins {
            if !plugin.converts(event.in_extension, event.out_extension) {
                continue;
            }
            plugin
                .render(event)
                .await
                .map_err(|source| PluginFailure {
                    plugin: plugin.name(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Offer the finished document to every plugin.
    pub async fn trigger_render_document(&self, event: &mut RenderDocumentEvent<'_>) -> Result<(), PluginFailure> {
        for plugin in &self.plugins {
            plugin
                .render_document(event)
                .await
                .map_err(|source| PluginFailure {
                    plugin: plugin.name(),
                    source,
                })?;
        }
        Ok(())
    }
}
