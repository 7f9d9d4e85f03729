//! Converting content along a document's extensions.
//!
//! Extensions are applied from the last to the first, so `post.html.md`
//! converts `md` to `html` and `about.html.md.tera` runs `tera` to `md`,
//! then `md` to `html`.

use tracing::warn;

use crate::build::document::{Document, SingleExtensions};
use crate::build::events::SiteEvent;
use crate::build::pipeline::{RenderContext, RenderError, RenderStage};
use crate::build::plugins::RenderEvent;
use crate::build::template_data::TemplateData;

/// One conversion step of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub in_extension: String,
    /// `None` for the terminal step of a single-extension document.
    pub out_extension: Option<String>,
}

/// The conversions a file goes through.
///
/// A file without extensions uses its own name. A single extension only
/// converts (to `None`) when `single` allows it.
pub fn extension_chain(filename: &str, extensions: &[String], single: SingleExtensions) -> Vec<Conversion> {
    let bare = filename.trim_start_matches('.');
    let mut chain: Vec<Option<String>> = extensions.iter().rev().cloned().map(Some).collect();
    if chain.is_empty() && !bare.is_empty() {
        chain.push(Some(bare.to_string()));
    }

    if chain.len() == 1 {
        let fire = match single {
            SingleExtensions::Never => false,
            SingleExtensions::Always => true,
            SingleExtensions::Auto => chain[0].as_deref() == Some(bare),
        };
        if fire {
            chain.push(None);
        }
    }

    chain
        .windows(2)
        .filter_map(|pair| {
            Some(Conversion {
                in_extension: pair[0].clone()?,
                out_extension: pair[1].clone(),
            })
        })
        .collect()
}

pub(crate) async fn render_extensions(
    ctx: &RenderContext,
    document: &Document,
    content: String,
    template_data: &TemplateData,
    single: SingleExtensions,
) -> Result<String, RenderError> {
    let conversions = extension_chain(&document.file.filename, &document.file.extensions, single);

    let mut content = content;
    for conversion in &conversions {
        let mut event = RenderEvent {
            in_extension: &conversion.in_extension,
            out_extension: conversion.out_extension.as_deref(),
            template_data,
            document,
            content: content.clone(),
        };
        ctx.plugins
            .trigger_render(&mut event)
            .await
            .map_err(|failure| RenderError::Stage {
                stage: RenderStage::RenderExtensions.name(),
                file_path: document.file.path_display(),
                plugin: failure.plugin,
                source: failure.source,
            })?;

        if !content.is_empty() && event.content == content {
            warn!(
                file = %document.file.relative_path,
                in_extension = %conversion.in_extension,
                out_extension = conversion.out_extension.as_deref().unwrap_or("none"),
                "rendering the extension did not change the content, is a plugin for it missing?"
            );
            ctx.events.trigger(&SiteEvent::RenderNoChange {
                document: document.file.relative_path.clone(),
                in_extension: conversion.in_extension.clone(),
                out_extension: conversion.out_extension.clone(),
            });
            continue;
        }
        content = event.content;
    }

    Ok(content)
}
