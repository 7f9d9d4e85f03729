//! Data handed to templates while a document renders.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Key under which a layout receives the content it wraps.
pub const CONTENT_KEY: &str = "content";

/// Key under which templates see the document being rendered.
pub const DOCUMENT_KEY: &str = "document";

/// A function templates can call.
///
/// Helpers receive the template data they were called with, so they act as
/// methods of it rather than free functions.
pub trait TemplateHelper: Send + Sync {
    fn call(&self, data: &Map<String, Value>, args: &HashMap<String, Value>) -> Result<Value, String>;
}

impl<F> TemplateHelper for F
where
    F: Fn(&Map<String, Value>, &HashMap<String, Value>) -> Result<Value, String> + Send + Sync,
{
    fn call(&self, data: &Map<String, Value>, args: &HashMap<String, Value>) -> Result<Value, String> {
        self(data, args)
    }
}

#[derive(Clone, Default)]
pub struct TemplateData {
    values: Map<String, Value>,
    helpers: BTreeMap<String, Arc<dyn TemplateHelper>>,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            helpers: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Set the content a layout wraps.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.values
            .insert(CONTENT_KEY.to_string(), Value::String(content.into()));
    }

    pub fn content(&self) -> Option<&str> {
        self.values.get(CONTENT_KEY).and_then(Value::as_str)
    }

    pub fn register_helper<H: TemplateHelper + 'static>(&mut self, name: impl Into<String>, helper: H) -> &mut Self {
        self.helpers.insert(name.into(), Arc::new(helper));
        self
    }

    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }

    /// Every helper, bound to a snapshot of the current values.
    pub fn bound_helpers(&self) -> Vec<BoundHelper> {
        let data = Arc::new(self.values.clone());
        self.helpers
            .iter()
            .map(|(name, helper)| BoundHelper {
                name: name.clone(),
                helper: Arc::clone(helper),
                data: Arc::clone(&data),
            })
            .collect()
    }
}

impl fmt::Debug for TemplateData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateData")
            .field("values", &self.values)
            .field("helpers", &self.helper_names().collect::<Vec<_>>())
            .finish()
    }
}

/// A helper paired with the template data it is called against.
#[derive(Clone)]
pub struct BoundHelper {
    name: String,
    helper: Arc<dyn TemplateHelper>,
    data: Arc<Map<String, Value>>,
}

impl BoundHelper {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, args: &HashMap<String, Value>) -> Result<Value, String> {
        self.helper.call(&self.data, args)
    }
}
