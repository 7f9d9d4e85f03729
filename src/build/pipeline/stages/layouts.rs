//! Wrapping rendered content in layouts.

use crate::build::document::Document;
use crate::build::layout::{check_chain, get_layout};
use crate::build::pipeline::{RenderContext, RenderError, RenderOptions, render_document};
use crate::build::template_data::TemplateData;

/// Render the document's layout around `content`.
///
/// The layout is an owned copy from the lookup, rendered through the full
/// pipeline with the same template data plus the wrapped content.
pub(crate) async fn render_layouts(
    ctx: &RenderContext,
    document: &mut Document,
    content: String,
    template_data: &mut TemplateData,
    layout_chain: &[String],
) -> Result<String, RenderError> {
    let Some(mut layout) = get_layout(ctx, document)? else {
        return match document.layout() {
            Some(selector) => Err(RenderError::MissingLayout {
                selector: selector.to_string(),
                file_path: document.file.path_display(),
            }),
            None => Ok(content),
        };
    };

    let mut chain = layout_chain.to_vec();
    if chain.is_empty() {
        chain.push(document.file.relative_path.clone());
    }
    chain.push(layout.file.relative_path.clone());
    check_chain(&chain, ctx.settings.max_layout_depth)?;

    template_data.set_content(content);
    let options = RenderOptions {
        template_data: Some(template_data.clone()),
        layout_chain: chain,
        ..Default::default()
    };

    render_document(ctx, &mut layout, options)
        .await
        .map_err(|source| RenderError::Layout {
            file_path: document.file.path_display(),
            layout: layout.file.relative_path.clone(),
            source: Box::new(source),
        })
}
