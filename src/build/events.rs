//! Site events and the dependency tracker that listens to them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteEvent {
    /// A document's layout selector resolved to a stored layout.
    LayoutResolved { document: String, layout: String },
    /// A render step left the content exactly as it was.
    RenderNoChange {
        document: String,
        in_extension: String,
        out_extension: Option<String>,
    },
    DocumentRendered { document: String },
}

impl SiteEvent {
    pub const LAYOUT_RESOLVED: &'static str = "layoutResolved";
    pub const RENDER_NO_CHANGE: &'static str = "renderNoChange";
    pub const DOCUMENT_RENDERED: &'static str = "documentRendered";

    pub fn name(&self) -> &'static str {
        match self {
            SiteEvent::LayoutResolved { .. } => Self::LAYOUT_RESOLVED,
            SiteEvent::RenderNoChange { .. } => Self::RENDER_NO_CHANGE,
            SiteEvent::DocumentRendered { .. } => Self::DOCUMENT_RENDERED,
        }
    }
}

type Handler = Arc<dyn Fn(&SiteEvent) + Send + Sync>;

/// Named event handlers, shared by every clone of the bus.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<&'static str, Vec<Handler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, name: &'static str, handler: F)
    where
        F: Fn(&SiteEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Run every handler registered for the event, returning how many ran.
    pub fn trigger(&self, event: &SiteEvent) -> usize {
        // Handlers run outside the lock so they may register further handlers
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.name())
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = handlers.keys().collect();
        names.sort();
        f.debug_struct("EventBus").field("events", &names).finish()
    }
}

/// Remembers which documents use which layouts.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    dependents: RwLock<BTreeMap<String, BTreeSet<String>>>,
}

impl DependencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to layout resolutions on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let tracker = Arc::clone(self);
        bus.on(SiteEvent::LAYOUT_RESOLVED, move |event| {
            if let SiteEvent::LayoutResolved { document, layout } = event {
                tracker.record(layout, document);
            }
        });
    }

    pub fn record(&self, layout: &str, document: &str) {
        let inserted = self
            .dependents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(layout.to_string())
            .or_default()
            .insert(document.to_string());
        if inserted {
            debug!(layout, document, "recorded layout dependency");
        }
    }

    /// Everything that renders through `layout`, directly or via other layouts.
    pub fn dependents_of(&self, layout: &str) -> BTreeSet<String> {
        let dependents = self.dependents.read().unwrap_or_else(PoisonError::into_inner);

        let mut found = BTreeSet::new();
        let mut pending = vec![layout.to_string()];
        while let Some(current) = pending.pop() {
            for dependent in dependents.get(&current).into_iter().flatten() {
                if found.insert(dependent.clone()) {
                    pending.push(dependent.clone());
                }
            }
        }
        found.remove(layout);
        found
    }

    pub fn clear(&self) {
        self.dependents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
