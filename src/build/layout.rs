//! Resolving the layout a document is wrapped in.

use tracing::debug;

use super::document::Document;
use super::events::SiteEvent;
use super::pipeline::{RenderContext, RenderError};

/// Look up the layout a document names.
///
/// Returns `None` when the document has no layout or the layout does not
/// exist. A found layout is recorded on the document and announced so
/// dependents can be re-rendered when it changes.
pub fn get_layout(ctx: &RenderContext, document: &mut Document) -> Result<Option<Document>, RenderError> {
    let Some(selector) = document.layout().map(str::to_string) else {
        return Ok(None);
    };

    match ctx.lookup.find_layout(&selector) {
        Err(source) => {
            document.layout_relative_path = None;
            Err(RenderError::LayoutLookup {
                selector,
                file_path: document.file.path_display(),
                source,
            })
        }
        Ok(None) => {
            document.layout_relative_path = None;
            Ok(None)
        }
        Ok(Some(layout)) => {
            let layout_path = layout.file.relative_path.clone();
            debug!(file = %document.file.relative_path, layout = %layout_path, "resolved layout");
            ctx.events.trigger(&SiteEvent::LayoutResolved {
                document: document.file.relative_path.clone(),
                layout: layout_path.clone(),
            });
            document.layout_relative_path = Some(layout_path);
            Ok(Some(layout))
        }
    }
}

/// The outermost document of the layout chain: the document itself when it
/// has no layout, `None` when some layout along the way is missing.
pub fn get_eve(ctx: &RenderContext, document: &mut Document) -> Result<Option<Document>, RenderError> {
    let Some(mut current) = get_layout(ctx, document)? else {
        return Ok(if document.has_layout() {
            None
        } else {
            Some(document.clone())
        });
    };

    let mut chain = vec![
        document.file.relative_path.clone(),
        current.file.relative_path.clone(),
    ];
    check_chain(&chain, ctx.settings.max_layout_depth)?;

    while current.has_layout() {
        let Some(parent) = get_layout(ctx, &mut current)? else {
            return Ok(None);
        };
        chain.push(parent.file.relative_path.clone());
        check_chain(&chain, ctx.settings.max_layout_depth)?;
        current = parent;
    }

    Ok(Some(current))
}

/// Fail when the newest entry of `chain` already appeared, or the chain has
/// grown deeper than allowed.
pub(crate) fn check_chain(chain: &[String], max_depth: usize) -> Result<(), RenderError> {
    let Some((last, earlier)) = chain.split_last() else {
        return Ok(());
    };
    if earlier.contains(last) || chain.len() > max_depth + 1 {
        return Err(RenderError::LayoutCycle {
            chain: chain.to_vec(),
        });
    }
    Ok(())
}
