//! Shared state for rendering documents.

use std::sync::Arc;

use crate::build::database::DocumentLookup;
use crate::build::events::EventBus;
use crate::build::plugins::PluginRegistry;
use crate::config::RenderConfig;

/// Everything a render needs besides the document itself.
///
/// Cheap to clone: the plugins and lookup are shared, and clones of the
/// event bus deliver to the same handlers.
#[derive(Clone)]
pub struct RenderContext {
    pub plugins: Arc<PluginRegistry>,
    pub lookup: Arc<dyn DocumentLookup>,
    pub events: EventBus,
    pub settings: RenderConfig,
}

impl RenderContext {
    pub fn new(plugins: Arc<PluginRegistry>, lookup: Arc<dyn DocumentLookup>) -> Self {
        Self {
            plugins,
            lookup,
            events: EventBus::new(),
            settings: RenderConfig::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: RenderConfig) -> Self {
        self.settings = settings;
        self
    }
}
