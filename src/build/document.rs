//! Documents: files with a meta-data header, a body and render results.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::cson;
use super::file::{FileEntity, OutputOverrides};
use super::layout;
use super::meta::{self, MetaFormat, ParseError};
use super::pipeline::{RenderContext, RenderError};
use crate::util;

/// Whether a document with a single extension is run through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SingleExtensions {
    #[default]
    Never,
    Always,
    /// Only when the extension is the whole filename, as with `.htaccess`.
    Auto,
}

impl SingleExtensions {
    /// Read the setting from a meta-data value (`true`, `false` or `"auto"`).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Self::Always),
            Value::Bool(false) => Some(Self::Never),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "auto" => Some(Self::Auto),
                "true" | "always" => Some(Self::Always),
                "false" | "never" => Some(Self::Never),
                _ => None,
            },
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SingleExtensions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| {
            D::Error::custom(format!(
                "render_single_extensions must be true, false or \"auto\", found {value}"
            ))
        })
    }
}

/// How far a document got through its last render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Unrendered,
    ExtensionsRendered,
    DocumentRendered,
    LayoutsRendered,
    Complete,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub file: FileEntity,
    /// Raw header text, without delimiters.
    pub header: Option<String>,
    pub body: String,
    /// The whole content, header included, with normalized line endings.
    pub source: String,
    pub parser: Option<MetaFormat>,
    pub meta: Map<String, Value>,
    pub date: Option<DateTime<Utc>>,
    pub rendered: bool,
    pub render_state: RenderState,
    pub content_rendered: Option<String>,
    pub content_rendered_without_layouts: Option<String>,
    pub layout_relative_path: Option<String>,
    pub references_others: bool,
    pub rendered_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(file: FileEntity) -> Self {
        Self {
            file,
            header: None,
            body: String::new(),
            source: String::new(),
            parser: None,
            meta: Map::new(),
            date: None,
            rendered: false,
            render_state: RenderState::Unrendered,
            content_rendered: None,
            content_rendered_without_layouts: None,
            layout_relative_path: None,
            references_others: false,
            rendered_at: None,
        }
    }

    /// An in-memory document, parsed from `text`.
    pub fn from_text(relative_path: &str, text: &str) -> Result<Self, ParseError> {
        let mut document = Self::new(FileEntity::from_text(relative_path, text));
        document.parse()?;
        Ok(document)
    }

    /// Split the content into header and body and apply the meta-data.
    ///
    /// A header that declares a different `encoding` causes one more pass
    /// over the raw bytes with that encoding.
    pub fn parse(&mut self) -> Result<(), ParseError> {
        let file_path = self.file.path_display();
        let mut reencoded = false;

        let parsed = loop {
            self.file.decode().map_err(|_| ParseError::Encoding {
                encoding: self.file.encoding.clone(),
                file_path: file_path.clone(),
            })?;
            let parsed = meta::parse_meta(&self.file.content, &file_path)?;

            let declared = parsed.changes.get("encoding").and_then(Value::as_str);
            match declared {
                Some(encoding) if !reencoded && !encoding.eq_ignore_ascii_case(&self.file.encoding) => {
                    debug!(file = %file_path, encoding, "re-reading document with its declared encoding");
                    self.file.encoding = encoding.to_string();
                    reencoded = true;
                }
                _ => break parsed,
            }
        };

        self.source = parsed.source;
        self.header = parsed.header;
        self.parser = parsed.parser;
        self.body = parsed.body;
        self.file.content = self.body.clone();

        self.set_meta(parsed.changes);
        Ok(())
    }

    /// Replace the meta-data, interpreting the well-known fields.
    pub fn set_meta(&mut self, changes: Map<String, Value>) {
        let normalized = meta::normalize_meta(changes, &self.file.path_display());

        self.meta = normalized.meta;
        self.date = normalized.date;
        self.file.clear_urls();
        if let Some(url) = normalized.url {
            self.file.set_url(url);
        }
        for url in normalized.urls {
            self.file.add_url(url);
        }
        self.references_others = self.meta.get("referencesOthers").is_some_and(meta::truthy);

        self.normalize();
    }

    /// Recompute output paths, taking the out extension from the meta-data
    /// or the first extension.
    pub fn normalize(&mut self) {
        let mut overrides = self.output_overrides();
        if overrides.out_extension.is_none() {
            overrides.out_extension = self.file.extensions.first().cloned();
        }
        self.file.normalize(&overrides);
    }

    /// Settle the output extension against the top-most layout, so a
    /// markdown page wrapped in an html layout is written as html.
    pub fn contextualize(&mut self, ctx: &RenderContext) -> Result<(), RenderError> {
        let eve = layout::get_eve(ctx, self)?;

        let mut overrides = self.output_overrides();
        if overrides == OutputOverrides::default() {
            overrides.out_extension = eve
                .and_then(|eve| eve.file.out_extension)
                .or_else(|| self.file.extensions.first().cloned());
            self.file.normalize(&overrides);
        }
        Ok(())
    }

    fn output_overrides(&self) -> OutputOverrides {
        let string = |key: &str| self.meta.get(key).and_then(Value::as_str).map(str::to_string);
        OutputOverrides {
            out_extension: string("outExtension"),
            out_filename: string("outFilename"),
            out_path: string("outPath"),
        }
    }

    /// The layout selector from the meta-data.
    pub fn layout(&self) -> Option<&str> {
        self.meta
            .get("layout")
            .and_then(Value::as_str)
            .filter(|layout| !layout.is_empty())
    }

    pub fn has_layout(&self) -> bool {
        self.layout().is_some()
    }

    /// The single extension setting from the meta-data, if any.
    pub fn render_single_extensions(&self) -> Option<SingleExtensions> {
        self.meta
            .get("renderSingleExtensions")
            .and_then(SingleExtensions::from_value)
    }

    pub fn is_ignored(&self) -> bool {
        self.meta.get("ignored").is_some_and(meta::truthy)
    }

    /// The title from the meta-data, falling back to the basename.
    pub fn title(&self) -> String {
        self.meta
            .get("title")
            .or_else(|| self.meta.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| util::title_case(&self.file.basename))
    }

    /// What gets written to the output file.
    pub fn out_content(&self) -> &str {
        self.content_rendered.as_deref().unwrap_or(&self.body)
    }

    /// The document source rebuilt from its meta-data and body, with the
    /// meta-data written as a CSON header.
    pub fn to_source(&self) -> String {
        let mut meta = self.meta.clone();
        meta.remove("writeSource");

        let header = cson::encode(&meta);
        let body = self.body.trim_start();
        if header.is_empty() || header == "{}" {
            body.to_string()
        } else {
            format!("### cson\n{header}\n###\n\n{body}")
        }
    }

    /// Write the rebuilt source back to the document's own path.
    pub async fn write_source(&self) -> std::io::Result<()> {
        write_file(&self.file.full_path, self.to_source().as_bytes()).await
    }

    /// A plain view of the document for templates.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(DocumentSnapshot::from(self)).unwrap_or_default()
    }
}

/// Write bytes to `path`, creating parent directories.
pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSnapshot<'a> {
    #[serde(flatten)]
    meta: &'a Map<String, Value>,
    title: String,
    relative_path: &'a str,
    relative_base: &'a str,
    filename: &'a str,
    basename: &'a str,
    extensions: &'a [String],
    out_extension: Option<&'a str>,
    relative_out_path: &'a str,
    url: &'a str,
    urls: &'a [String],
    date: Option<DateTime<Utc>>,
    layout: Option<&'a str>,
    ignored: bool,
    body: &'a str,
    content_rendered: Option<&'a str>,
    parser: Option<&'static str>,
    encoding: &'a str,
}

impl<'a> From<&'a Document> for DocumentSnapshot<'a> {
    fn from(doc: &'a Document) -> Self {
        Self {
            meta: &doc.meta,
            title: doc.title(),
            relative_path: &doc.file.relative_path,
            relative_base: &doc.file.relative_base,
            filename: &doc.file.filename,
            basename: &doc.file.basename,
            extensions: &doc.file.extensions,
            out_extension: doc.file.out_extension.as_deref(),
            relative_out_path: &doc.file.relative_out_path,
            url: &doc.file.url,
            urls: &doc.file.urls,
            date: doc.date,
            layout: doc.layout(),
            ignored: doc.is_ignored(),
            body: &doc.body,
            content_rendered: doc.content_rendered.as_deref(),
            parser: doc.parser.map(MetaFormat::name),
            encoding: &doc.file.encoding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_text() {
        let doc = Document::from_text("blog/post.html.md", "---\ntitle: Hello\n---\nBody text").unwrap();

        assert_eq!(doc.meta.get("title"), Some(&json!("Hello")));
        assert_eq!(doc.body, "Body text");
        assert_eq!(doc.file.content, "Body text");
        assert_eq!(doc.header.as_deref(), Some("title: Hello"));
        assert_eq!(doc.file.out_extension.as_deref(), Some("html"));
        assert_eq!(doc.file.relative_out_path, "blog/post.html");
        assert_eq!(doc.file.url, "/blog/post.html");
        assert!(!doc.rendered);
    }

    #[test]
    fn test_meta_overrides_output() {
        let doc = Document::from_text(
            "feed.xml.tera",
            "---\noutExtension: rss\nurl: /feed/\nurls: [/atom.xml]\n---\n",
        )
        .unwrap();

        assert_eq!(doc.file.out_filename, "feed.rss");
        assert_eq!(doc.file.url, "/feed/");
        assert!(doc.file.urls.contains(&"/atom.xml".to_string()));
    }

    #[test]
    fn test_set_meta_replaces_previous_state() {
        let mut doc = Document::from_text(
            "about.html.md",
            "---\nurl: /about/\nurls: [/me]\nreferencesOthers: true\n---\n",
        )
        .unwrap();
        assert_eq!(doc.file.url, "/about/");
        assert!(doc.references_others);

        doc.set_meta(Map::new());
        assert_eq!(doc.file.url, "/about.html");
        assert_eq!(doc.file.urls, vec!["/about.html"]);
        assert!(!doc.references_others);
    }

    #[test]
    fn test_contextualize_takes_extension_from_outermost_layout() {
        use std::sync::Arc;

        use crate::build::database::{Collection, Database};
        use crate::build::plugins::PluginRegistry;

        let db = Database::new();
        let layouts = vec![
            Document::from_text("default.html.tera", "{{ content }}").unwrap(),
            Document::from_text("note.tera", "---\nlayout: default\n---\n{{ content }}").unwrap(),
        ];
        db.replace_all(Collection::Layouts, layouts).unwrap();
        let ctx = RenderContext::new(Arc::new(PluginRegistry::new()), Arc::new(db));

        let mut doc = Document::from_text("notes.md", "---\nlayout: note\n---\n# Notes").unwrap();
        assert_eq!(doc.file.relative_out_path, "notes.md");
        doc.contextualize(&ctx).unwrap();
        assert_eq!(doc.file.relative_out_path, "notes.html");
        assert_eq!(doc.file.url, "/notes.html");

        let mut doc = Document::from_text("notes.md", "---\nlayout: default\noutFilename: notes.txt\n---\n").unwrap();
        doc.contextualize(&ctx).unwrap();
        assert_eq!(doc.file.relative_out_path, "notes.txt");

        let mut doc = Document::from_text("notes.md", "---\nlayout: default\noutPath: raw/notes.md\n---\n").unwrap();
        doc.contextualize(&ctx).unwrap();
        assert_eq!(doc.file.relative_out_path, "raw/notes.md");
    }

    #[test]
    fn test_flags_and_title() {
        let doc = Document::from_text("getting-started.html.md", "---\ndraft: yes\n---\n").unwrap();
        assert!(doc.is_ignored());
        assert_eq!(doc.title(), "Getting Started");

        let doc = Document::from_text("a.md", "---\ntitle: Named\nreferencesOthers: true\n---\n").unwrap();
        assert!(!doc.is_ignored());
        assert!(doc.references_others);
        assert_eq!(doc.title(), "Named");
    }

    #[test]
    fn test_encoding_reparse() {
        let mut bytes = b"---\nencoding: latin1\ntitle: caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\n---\nna\xEFve");

        let mut file = FileEntity::new("doc.md", "doc.md");
        file.buffer = bytes;
        let mut doc = Document::new(file);
        doc.parse().unwrap();

        assert_eq!(doc.file.encoding, "latin1");
        assert_eq!(doc.meta.get("title"), Some(&json!("café")));
        assert_eq!(doc.body, "naïve");
    }

    #[test]
    fn test_unknown_encoding_fails() {
        let err = Document::from_text("doc.md", "---\nencoding: klingon\n---\nBody").unwrap_err();
        assert!(matches!(err, ParseError::Encoding { .. }));
    }

    #[test]
    fn test_single_extensions_from_value() {
        assert_eq!(SingleExtensions::from_value(&json!(true)), Some(SingleExtensions::Always));
        assert_eq!(SingleExtensions::from_value(&json!(false)), Some(SingleExtensions::Never));
        assert_eq!(SingleExtensions::from_value(&json!("auto")), Some(SingleExtensions::Auto));
        assert_eq!(SingleExtensions::from_value(&json!(3)), None);

        let doc = Document::from_text(".htaccess", "---\nrenderSingleExtensions: auto\n---\n").unwrap();
        assert_eq!(doc.render_single_extensions(), Some(SingleExtensions::Auto));
    }

    #[test]
    fn test_to_source_round_trip() {
        let original = Document::from_text(
            "post.html.md",
            "---\ntitle: Hello\ntags: [a, b]\nauthor:\n  name: Bob\nwriteSource: true\n---\n\nBody text",
        )
        .unwrap();

        let source = original.to_source();
        assert!(source.starts_with("### cson\n"));
        assert!(!source.contains("writeSource"));

        let reparsed = Document::from_text("post.html.md", &source).unwrap();
        let mut expected = original.meta.clone();
        expected.remove("writeSource");
        assert_eq!(reparsed.meta, expected);
        assert_eq!(reparsed.body, "Body text");
        assert_eq!(reparsed.parser, Some(MetaFormat::Cson));
    }

    #[test]
    fn test_to_source_without_meta() {
        let doc = Document::from_text("plain.txt", "\n\n   Just text").unwrap();
        assert_eq!(doc.to_source(), "Just text");
    }

    #[tokio::test]
    async fn test_write_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.html.md");
        let mut doc = Document::from_text("post.html.md", "---\ntitle: Hi\n---\nBody").unwrap();
        doc.file.full_path = path.clone();

        doc.write_source().await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "### cson\ntitle: \"Hi\"\n###\n\nBody");
    }

    #[test]
    fn test_snapshot() {
        let doc = Document::from_text("blog/post.html.md", "---\ntitle: Hello\ncustom: 3\n---\nBody").unwrap();
        let snapshot = doc.snapshot();

        assert_eq!(snapshot["title"], json!("Hello"));
        assert_eq!(snapshot["custom"], json!(3));
        assert_eq!(snapshot["url"], json!("/blog/post.html"));
        assert_eq!(snapshot["relativePath"], json!("blog/post.html.md"));
        assert_eq!(snapshot["extensions"], json!(["html", "md"]));
    }
}
