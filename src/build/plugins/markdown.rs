//! Markdown to HTML conversion with syntax-highlighted code blocks.

use std::collections::HashSet;

use async_trait::async_trait;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use super::{PluginError, RenderEvent, RenderPlugin};
use crate::build::highlight::SyntaxHighlighter;
use crate::config::MarkdownConfig;

#[derive(thiserror::Error, Debug)]
pub enum MarkdownError {
    #[error("invalid markdown extension: {0}")]
    InvalidExtension(String),
}

/// Converts `md` and `markdown` content to `html`.
pub struct MarkdownPlugin {
    options: Options,
    highlighter: SyntaxHighlighter,
}

impl MarkdownPlugin {
    pub fn new(config: &MarkdownConfig, highlighter: SyntaxHighlighter) -> Result<Self, MarkdownError> {
        let mut options = Options::empty();
        for extension in &config.extensions {
            match extension.as_str() {
                "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
                "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
                "gfm" => options.insert(Options::ENABLE_GFM),
                "heading_attributes" => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
                "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
                "tables" => options.insert(Options::ENABLE_TABLES),
                "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
                other => return Err(MarkdownError::InvalidExtension(other.to_string())),
            }
        }

        Ok(Self { options, highlighter })
    }

    /// Render markdown to HTML.
    pub fn render_html(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);

        // Code blocks are collected and emitted as highlighted HTML
        let mut in_code_block = false;
        let mut code_language = String::new();
        let mut code_content = String::new();

        // Headings without an explicit id get one generated from their text
        let mut heading: Option<HeadingLevel> = None;
        let mut heading_html = String::new();
        let mut used_ids: HashSet<String> = HashSet::new();

        let events: Vec<Event> = parser
            .flat_map(|event| match event {
                Event::Start(Tag::Heading { level, id: None, .. }) => {
                    heading = Some(level);
                    heading_html.clear();
                    vec![]
                }
                Event::Start(Tag::Heading { ref id, .. }) => {
                    if let Some(id) = id {
                        used_ids.insert(id.to_string());
                    }
                    vec![event]
                }
                Event::End(TagEnd::Heading(_)) if heading.is_some() => {
                    let level = heading.take().map(|level| level as usize).unwrap_or(1);
                    let base = slugify(&strip_tags(&heading_html));
                    let mut id = base.clone();
                    let mut suffix = 1;
                    while used_ids.contains(&id) {
                        id = format!("{base}-{suffix}");
                        suffix += 1;
                    }
                    used_ids.insert(id.clone());
                    vec![Event::Html(
                        format!("<h{level} id=\"{id}\">{heading_html}</h{level}>\n").into(),
                    )]
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_language = match kind {
                        CodeBlockKind::Fenced(lang) => lang.to_string(),
                        CodeBlockKind::Indented => String::new(),
                    };
                    code_content.clear();
                    vec![]
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let highlighted = self.highlighter.highlight(&code_content, &code_language);
                    vec![Event::Html(highlighted.into())]
                }
                Event::Text(text) if in_code_block => {
                    code_content.push_str(&text);
                    vec![]
                }
                other if heading.is_some() => {
                    html::push_html(&mut heading_html, std::iter::once(other));
                    vec![]
                }
                other => vec![other],
            })
            .collect();

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }
}

#[async_trait]
impl RenderPlugin for MarkdownPlugin {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn converts(&self, in_extension: &str, out_extension: Option<&str>) -> bool {
        matches!(in_extension, "md" | "markdown") && out_extension == Some("html")
    }

    async fn render(&self, event: &mut RenderEvent<'_>) -> Result<(), PluginError> {
        event.content = self.render_html(&event.content);
        Ok(())
    }
}

/// Convert a string to a slug suitable for use as an HTML id.
fn slugify(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .replace(' ', "-")
        .replace(|c: char| !c.is_alphanumeric() && c != '-', "")
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}
