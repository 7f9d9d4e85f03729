use crate::build::document::Document;
use crate::build::pipeline::{RenderContext, RenderError, RenderStage};
use crate::build::plugins::RenderDocumentEvent;
use crate::build::template_data::TemplateData;

/// Give every plugin a chance to post-process the converted document.
pub(crate) async fn render_document_hook(
    ctx: &RenderContext,
    document: &Document,
    content: String,
    template_data: &TemplateData,
) -> Result<String, RenderError> {
    let mut event = RenderDocumentEvent {
        extension: document.file.extensions.first().map(String::as_str),
        template_data,
        document,
        content,
    };

    ctx.plugins
        .trigger_render_document(&mut event)
        .await
        .map_err(|failure| RenderError::Stage {
            stage: RenderStage::RenderDocument.name(),
            file_path: document.file.path_display(),
            plugin: failure.plugin,
            source: failure.source,
        })?;

    Ok(event.content)
}
