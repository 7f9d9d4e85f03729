//! Document render pipeline.
//!
//! A render runs three stages in order:
//! 1. `renderExtensions` - convert the content along the extension chain
//! 2. `renderDocument` - whole-document plugin hook
//! 3. `renderLayouts` - wrap the content in the document's layout, which
//!    renders through this same pipeline
//!
//! The result is only stored on the document when every stage succeeds.

mod context;
mod error;
mod stages;

use std::str::FromStr;

use chrono::Utc;
use futures_util::future::BoxFuture;
use tracing::debug;

pub use context::RenderContext;
pub use error::RenderError;
pub use stages::{Conversion, extension_chain};

use super::document::{Document, RenderState, SingleExtensions};
use super::events::SiteEvent;
use super::template_data::{DOCUMENT_KEY, TemplateData};

/// A stage of the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    RenderExtensions,
    RenderDocument,
    RenderLayouts,
}

impl RenderStage {
    pub const ALL: [RenderStage; 3] = [
        RenderStage::RenderExtensions,
        RenderStage::RenderDocument,
        RenderStage::RenderLayouts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderStage::RenderExtensions => "renderExtensions",
            RenderStage::RenderDocument => "renderDocument",
            RenderStage::RenderLayouts => "renderLayouts",
        }
    }

    fn completed_state(self) -> RenderState {
        match self {
            RenderStage::RenderExtensions => RenderState::ExtensionsRendered,
            RenderStage::RenderDocument => RenderState::DocumentRendered,
            RenderStage::RenderLayouts => RenderState::LayoutsRendered,
        }
    }
}

impl FromStr for RenderStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderStage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| format!("unknown render stage '{s}'"))
    }
}

/// Options for a single render.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Stage names to run, defaulting to every stage.
    pub stages: Option<Vec<String>>,
    /// Content to render instead of the document body.
    pub content: Option<String>,
    pub template_data: Option<TemplateData>,
    pub render_single_extensions: Option<SingleExtensions>,
    /// No longer supported; setting it is a configuration error.
    pub apply: Option<bool>,
    /// Documents already being rendered further down this layout chain.
    layout_chain: Vec<String>,
}

impl RenderOptions {
    pub fn with_stages<S: Into<String>>(mut self, stages: impl IntoIterator<Item = S>) -> Self {
        self.stages = Some(stages.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_template_data(mut self, template_data: TemplateData) -> Self {
        self.template_data = Some(template_data);
        self
    }

    pub fn with_render_single_extensions(mut self, setting: SingleExtensions) -> Self {
        self.render_single_extensions = Some(setting);
        self
    }

    fn resolve_stages(&self, file_path: &str) -> Result<Vec<RenderStage>, RenderError> {
        match &self.stages {
            None => Ok(RenderStage::ALL.to_vec()),
            Some(names) => names
                .iter()
                .map(|name| name.parse().map_err(|message| RenderError::configuration(file_path, message)))
                .collect(),
        }
    }
}

/// Render a document, storing the result on it.
///
/// On failure the document keeps its previous render results and state.
pub fn render_document<'a>(
    ctx: &'a RenderContext,
    document: &'a mut Document,
    options: RenderOptions,
) -> BoxFuture<'a, Result<String, RenderError>> {
    Box::pin(async move {
        let file_path = document.file.path_display();
        if options.apply.is_some() {
            return Err(RenderError::configuration(
                &file_path,
                "the `apply` option is no longer supported, pass `content` and read the returned output instead",
            ));
        }
        let stages = options.resolve_stages(&file_path)?;

        let previous_state = document.render_state;
        debug!(file = %file_path, stages = stages.len(), "rendering document");

        match run_stages(ctx, document, &stages, options).await {
            Ok((content, without_layouts)) => {
                document.content_rendered_without_layouts =
                    Some(without_layouts.unwrap_or_else(|| content.clone()));
                document.content_rendered = Some(content.clone());
                document.rendered = true;
                document.render_state = RenderState::Complete;
                document.rendered_at = Some(Utc::now());
                ctx.events.trigger(&SiteEvent::DocumentRendered {
                    document: document.file.relative_path.clone(),
                });
                Ok(content)
            }
            Err(err) => {
                document.render_state = previous_state;
                Err(err)
            }
        }
    })
}

async fn run_stages(
    ctx: &RenderContext,
    document: &mut Document,
    stages: &[RenderStage],
    options: RenderOptions,
) -> Result<(String, Option<String>), RenderError> {
    let mut template_data = options.template_data.unwrap_or_default();
    if !template_data.contains_key(DOCUMENT_KEY) {
        template_data.insert(DOCUMENT_KEY, document.snapshot());
    }
    let single = options
        .render_single_extensions
        .or_else(|| document.render_single_extensions())
        .unwrap_or(ctx.settings.render_single_extensions);

    let mut content = options.content.unwrap_or_else(|| document.body.clone());
    let mut without_layouts = None;

    for &stage in stages {
        content = match stage {
            RenderStage::RenderExtensions => {
                stages::render_extensions(ctx, document, content, &template_data, single).await?
            }
            RenderStage::RenderDocument => {
                let rendered = stages::render_document_hook(ctx, document, content, &template_data).await?;
                without_layouts = Some(rendered.clone());
                rendered
            }
            RenderStage::RenderLayouts => {
                stages::render_layouts(ctx, document, content, &mut template_data, &options.layout_chain).await?
            }
        };
        document.render_state = stage.completed_state();
    }

    Ok((content, without_layouts))
}
