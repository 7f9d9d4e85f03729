//! Tera templates as a render step.
//!
//! Any `.tera` extension is rendered with the template data as context, so a
//! layout such as `default.html.tera` can place `{{ content }}` and a page
//! such as `about.html.md.tera` can use variables before markdown runs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::{PluginError, RenderEvent, RenderPlugin};
use crate::build::template_data::BoundHelper;

/// Name of the template being rendered. Having no `.html` suffix keeps Tera
/// from escaping the content of layouts.
const TEMPLATE_NAME: &str = "__docpress_render__";

pub struct TeraPlugin;

impl TeraPlugin {
    /// Render `source` as a Tera template.
    pub fn render_template(source: &str, data: &crate::build::TemplateData) -> Result<String, ::tera::Error> {
        let mut tera = ::tera::Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, source)?;
        for helper in data.bound_helpers() {
            let name = helper.name().to_string();
            tera.register_function(&name, helper);
        }

        let context = ::tera::Context::from_value(Value::Object(data.values().clone()))?;
        tera.render(TEMPLATE_NAME, &context)
    }
}

#[async_trait]
impl RenderPlugin for TeraPlugin {
    fn name(&self) -> &'static str {
        "tera"
    }

    fn converts(&self, in_extension: &str, _out_extension: Option<&str>) -> bool {
        in_extension == "tera"
    }

    async fn render(&self, event: &mut RenderEvent<'_>) -> Result<(), PluginError> {
        event.content = Self::render_template(&event.content, event.template_data)?;
        Ok(())
    }
}

impl ::tera::Function for BoundHelper {
    fn call(&self, args: &HashMap<String, Value>) -> ::tera::Result<Value> {
        self.invoke(args).map_err(::tera::Error::msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::TemplateData;
    use serde_json::{Map, json};

    #[test]
    fn test_render_with_data() {
        let mut data = TemplateData::new();
        data.insert("document", json!({"title": "Hello"}));
        data.set_content("<p>body</p>");

        let html = TeraPlugin::render_template("<h1>{{ document.title }}</h1>{{ content }}", &data).unwrap();
        assert_eq!(html, "<h1>Hello</h1><p>body</p>");
    }

    #[test]
    fn test_helpers_are_callable() {
        let mut data = TemplateData::new();
        data.insert("site", json!({"url": "https://example.com"}));
        data.register_helper(
            "absolute",
            |data: &Map<String, Value>, args: &HashMap<String, Value>| -> Result<Value, String> {
                let path = args.get("path").and_then(Value::as_str).ok_or("missing path")?;
                let base = data["site"]["url"].as_str().unwrap_or_default();
                Ok(Value::String(format!("{base}{path}")))
            },
        );

        let html = TeraPlugin::render_template("{{ absolute(path='/a') }}", &data).unwrap();
        assert_eq!(html, "https://example.com/a");
    }

    #[test]
    fn test_template_errors_surface() {
        let data = TemplateData::new();
        assert!(TeraPlugin::render_template("{{ missing_variable }}", &data).is_err());
        assert!(TeraPlugin::render_template("{% if %}", &data).is_err());
    }
}
