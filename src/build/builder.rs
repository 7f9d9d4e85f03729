use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::config::Config;

use super::action::{
    ActionError, ActionFailure, ActionOptions, ActionQueue, ActionRegistry, ActionResult, ActionRunner,
    IntoActionNames,
};
use super::database::{Collection, Database, DocumentLookup, LookupError};
use super::document::{Document, write_file};
use super::events::{DependencyTracker, EventBus};
use super::file::{FileEntity, FileError};
use super::highlight::SyntaxHighlighter;
use super::meta::ParseError;
use super::pipeline::{RenderContext, RenderError, RenderOptions, render_document};
use super::plugins::{MarkdownError, PluginRegistry};
use super::source::{SourceDir, SourceError, SourceKind};
use super::template_data::TemplateData;

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("file error: {0}")]
    File(#[from] FileError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("database error: {0}")]
    Lookup(#[from] LookupError),

    #[error("plugin setup failed: {0}")]
    Plugin(#[from] MarkdownError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("no document at {0}")]
    UnknownDocument(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Counts reported by the site actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub documents: usize,
    pub layouts: usize,
    pub files: usize,
    pub rendered: usize,
    pub written: usize,
    pub copied: usize,
    /// Documents marked as ignored, which are never written.
    pub skipped: usize,
    pub removed: bool,
}

impl BuildSummary {
    fn merge(&mut self, other: BuildSummary) {
        self.documents += other.documents;
        self.layouts += other.layouts;
        self.files += other.files;
        self.rendered += other.rendered;
        self.written += other.written;
        self.copied += other.copied;
        self.skipped += other.skipped;
        self.removed |= other.removed;
    }
}

/// Owns the site state and runs the site actions against it.
pub struct Builder {
    config: Config,
    /// Base path for resolving relative paths (typically the config file's directory)
    base_path: PathBuf,
    database: Arc<Database>,
    context: RenderContext,
    tracker: Arc<DependencyTracker>,
    runner: ActionRunner<Builder>,
}

impl Builder {
    pub fn new(config: Config, base_path: PathBuf) -> Result<Self, BuildError> {
        let plugins = PluginRegistry::with_defaults(&config)?;
        let database = Arc::new(Database::new());

        let events = EventBus::new();
        let tracker = DependencyTracker::new();
        tracker.attach(&events);

        let lookup: Arc<dyn DocumentLookup> = database.clone();
        let context = RenderContext::new(Arc::new(plugins), lookup)
            .with_events(events)
            .with_settings(config.render.clone());

        let mut registry: ActionRegistry<Builder> = ActionRegistry::new();
        registry
            .register("load", load_action)?
            .register("contextualize", contextualize_action)?
            .register("render", render_action)?
            .register("write", write_action)?
            .register("generate", generate_action)?
            .register("regenerate", regenerate_action)?
            .register("clean", clean_action)?;
        let runner = ActionRunner::new(registry, config.actions.group_policy);

        Ok(Self {
            config,
            base_path,
            database,
            context,
            tracker,
            runner,
        })
    }

    /// Run one bundle of site actions.
    pub async fn action(
        &self,
        names: impl IntoActionNames,
        options: &ActionOptions,
    ) -> Result<Vec<ActionResult>, ActionError> {
        self.runner.action(self, names, options).await
    }

    /// Run queued bundles of site actions, returning how many failed.
    pub async fn run_queue(&self, queue: ActionQueue<'_>) -> usize {
        self.runner.run_queue(self, queue).await
    }

    /// Get the output directory path, resolved against base_path.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.config.paths.out)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.base_path.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn source_dirs(&self, kind: SourceKind) -> Vec<SourceDir> {
        let paths = match kind {
            SourceKind::Documents => &self.config.paths.documents,
            SourceKind::Layouts => &self.config.paths.layouts,
            SourceKind::Files => &self.config.paths.files,
        };
        paths
            .iter()
            .map(|path| SourceDir::resolve(kind, path, &self.base_path))
            .collect()
    }

    /// The data every render starts from: `site`, the configured extra
    /// values and the built-in helpers.
    pub fn template_data(&self) -> TemplateData {
        let mut data = TemplateData::from_values(self.config.template_data.clone());
        data.insert(
            "site",
            json!({
                "name": self.config.site.name,
                "url": self.config.site.url,
            }),
        );
        data.register_helper("absolute_url", absolute_url);
        data
    }

    // =========================================================================
    // Site actions
    // =========================================================================

    /// Read every document, layout and static file into the database.
    pub async fn load(&self) -> Result<BuildSummary, BuildError> {
        let documents = self.load_documents(SourceKind::Documents).await?;
        let layouts = self.load_documents(SourceKind::Layouts).await?;

        let mut files = Vec::new();
        for dir in self.source_dirs(SourceKind::Files) {
            for entry in dir.discover()? {
                files.push(FileEntity::new(&entry.relative_path, entry.full_path));
            }
        }

        let summary = BuildSummary {
            documents: documents.len(),
            layouts: layouts.len(),
            files: files.len(),
            ..Default::default()
        };
        self.database.replace_all(Collection::Documents, documents)?;
        self.database.replace_all(Collection::Layouts, layouts)?;
        self.database.replace_files(files)?;

        info!(
            documents = summary.documents,
            layouts = summary.layouts,
            files = summary.files,
            "loaded site"
        );
        Ok(summary)
    }

    async fn load_documents(&self, kind: SourceKind) -> Result<Vec<Document>, BuildError> {
        let mut documents = Vec::new();
        for dir in self.source_dirs(kind) {
            for entry in dir.discover()? {
                let mut file = FileEntity::new(&entry.relative_path, entry.full_path);
                file.load().await?;
                let mut document = Document::new(file);
                document.parse()?;
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Settle each selected document's output path against its layouts.
    pub async fn contextualize(&self, options: &ActionOptions) -> Result<BuildSummary, BuildError> {
        let mut summary = BuildSummary::default();
        for mut document in self.selected_documents(options)? {
            document.contextualize(&self.context)?;
            self.database.upsert(Collection::Documents, document)?;
            summary.documents += 1;
        }
        Ok(summary)
    }

    /// Render each selected document and store the result.
    pub async fn render(&self, options: &ActionOptions) -> Result<BuildSummary, BuildError> {
        let mut summary = BuildSummary::default();
        for mut document in self.selected_documents(options)? {
            let render_options = RenderOptions::default().with_template_data(self.template_data());
            render_document(&self.context, &mut document, render_options).await?;
            debug!(file = %document.file.relative_path, "rendered document");
            self.database.upsert(Collection::Documents, document)?;
            summary.rendered += 1;
        }
        info!(rendered = summary.rendered, "rendered documents");
        Ok(summary)
    }

    /// Write rendered documents and copy static files to the output directory.
    pub async fn write(&self, options: &ActionOptions) -> Result<BuildSummary, BuildError> {
        let output_dir = self.output_dir();
        let mut summary = BuildSummary::default();

        for document in self.selected_documents(options)? {
            if document.is_ignored() {
                debug!(file = %document.file.relative_path, "skipping ignored document");
                summary.skipped += 1;
                continue;
            }
            let path = document.file.out_path(&output_dir);
            if !options.dry_run {
                write_file(&path, document.out_content().as_bytes())
                    .await
                    .map_err(|source| BuildError::Write { path, source })?;
            }
            summary.written += 1;
        }

        // Static files only go out on full writes
        if options.paths.is_empty() {
            for file in self.database.files()? {
                let path = file.out_path(&output_dir);
                if !options.dry_run {
                    copy_file(&file.full_path, &path).await?;
                }
                summary.copied += 1;
            }
            self.write_stylesheet(&output_dir, options.dry_run).await?;
        }

        info!(
            written = summary.written,
            copied = summary.copied,
            skipped = summary.skipped,
            output = %output_dir.display(),
            "wrote site"
        );
        Ok(summary)
    }

    async fn write_stylesheet(&self, output_dir: &Path, dry_run: bool) -> Result<(), BuildError> {
        let Some(relative) = &self.config.render.highlight_stylesheet else {
            return Ok(());
        };
        let highlighter = SyntaxHighlighter::new(&self.config.render.highlight_theme);
        let Some(css) = highlighter.stylesheet() else {
            warn!(theme = %self.config.render.highlight_theme, "unknown highlight theme, no stylesheet written");
            return Ok(());
        };
        if dry_run {
            return Ok(());
        }
        let path = output_dir.join(relative.trim_start_matches('/'));
        write_file(&path, css.as_bytes())
            .await
            .map_err(|source| BuildError::Write { path, source })
    }

    /// Load, contextualize, render and write the whole site.
    pub async fn generate(&self, options: &ActionOptions) -> Result<BuildSummary, BuildError> {
        self.tracker.clear();
        let everything = ActionOptions {
            paths: Vec::new(),
            ..options.clone()
        };

        let mut summary = self.load().await?;
        self.contextualize(&everything).await?;
        summary.merge(self.render(&everything).await?);
        summary.merge(self.write(&everything).await?);
        Ok(summary)
    }

    /// Reload the site and re-render only what the changed paths affect.
    ///
    /// A changed document re-renders itself; a changed layout re-renders
    /// everything that renders through it. Without paths this is a full
    /// generate.
    pub async fn regenerate(&self, options: &ActionOptions) -> Result<BuildSummary, BuildError> {
        if options.paths.is_empty() {
            return self.generate(options).await;
        }

        let mut previous: HashMap<String, Document> = self
            .database
            .all(Collection::Documents)?
            .into_iter()
            .map(|document| (document.file.relative_path.clone(), document))
            .collect();

        let mut summary = self.load().await?;
        let affected = self.affected_documents(&options.paths)?;
        info!(changed = options.paths.len(), affected = affected.len(), "regenerating");

        // Unaffected documents keep their previous render
        for document in self.database.all(Collection::Documents)? {
            let path = &document.file.relative_path;
            if affected.contains(path) {
                continue;
            }
            if let Some(rendered) = previous.remove(path) {
                self.database.upsert(Collection::Documents, rendered)?;
            }
        }

        let scoped = ActionOptions {
            paths: affected.into_iter().collect(),
            ..options.clone()
        };
        if scoped.paths.is_empty() {
            return Ok(summary);
        }
        self.contextualize(&scoped).await?;
        summary.merge(self.render(&scoped).await?);
        summary.merge(self.write(&scoped).await?);
        Ok(summary)
    }

    fn affected_documents(&self, changed: &[String]) -> Result<BTreeSet<String>, BuildError> {
        let mut affected = BTreeSet::new();
        for path in changed {
            let path = path.replace('\\', "/");
            if self.database.get(Collection::Documents, &path)?.is_some() {
                affected.insert(path.clone());
            }
            for dependent in self.tracker.dependents_of(&path) {
                if self.database.get(Collection::Documents, &dependent)?.is_some() {
                    affected.insert(dependent);
                }
            }
        }
        Ok(affected)
    }

    /// Remove the output directory.
    pub async fn clean(&self, options: &ActionOptions) -> Result<BuildSummary, BuildError> {
        let output_dir = self.output_dir();
        if !output_dir.exists() {
            return Ok(BuildSummary::default());
        }
        if !options.dry_run {
            tokio::fs::remove_dir_all(&output_dir)
                .await
                .map_err(|source| BuildError::Remove {
                    path: output_dir.clone(),
                    source,
                })?;
            info!(output = %output_dir.display(), "removed output directory");
        }
        Ok(BuildSummary {
            removed: true,
            ..Default::default()
        })
    }

    /// Render a single document by its path relative to a documents
    /// directory, returning the output. The site must be loaded.
    pub async fn render_path(&self, relative_path: &str) -> Result<String, BuildError> {
        let relative_path = relative_path.replace('\\', "/");
        let mut document = self
            .database
            .get(Collection::Documents, &relative_path)?
            .ok_or_else(|| BuildError::UnknownDocument(relative_path.clone()))?;

        document.contextualize(&self.context)?;
        let options = RenderOptions::default().with_template_data(self.template_data());
        let output = render_document(&self.context, &mut document, options).await?;
        self.database.upsert(Collection::Documents, document)?;
        Ok(output)
    }

    /// Documents limited to `options.paths`, or all of them.
    fn selected_documents(&self, options: &ActionOptions) -> Result<Vec<Document>, BuildError> {
        let documents = self.database.all(Collection::Documents)?;
        if options.paths.is_empty() {
            return Ok(documents);
        }
        Ok(documents
            .into_iter()
            .filter(|document| options.paths.contains(&document.file.relative_path))
            .collect())
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write {
        path: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::copy(from, to).await.map_err(write_error)?;
    Ok(())
}

/// `absolute_url(path="/a.html")` joins the site URL and a path.
fn absolute_url(data: &Map<String, Value>, args: &HashMap<String, Value>) -> Result<Value, String> {
    let path = args
        .get("path")
        .and_then(Value::as_str)
        .ok_or("absolute_url needs a `path` argument")?;
    let base = data
        .get("site")
        .and_then(|site| site.get("url"))
        .and_then(Value::as_str)
        .unwrap_or("");
    Ok(Value::String(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )))
}

// =============================================================================
// Action table
// =============================================================================

fn summary_value(summary: BuildSummary) -> Result<Value, ActionFailure> {
    Ok(serde_json::to_value(summary)?)
}

fn load_action<'a>(builder: &'a Builder, _options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.load().await?) })
}

fn contextualize_action<'a>(
    builder: &'a Builder,
    options: &'a ActionOptions,
) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.contextualize(options).await?) })
}

fn render_action<'a>(builder: &'a Builder, options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.render(options).await?) })
}

fn write_action<'a>(builder: &'a Builder, options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.write(options).await?) })
}

fn generate_action<'a>(builder: &'a Builder, options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.generate(options).await?) })
}

fn regenerate_action<'a>(
    builder: &'a Builder,
    options: &'a ActionOptions,
) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.regenerate(options).await?) })
}

fn clean_action<'a>(builder: &'a Builder, options: &'a ActionOptions) -> BoxFuture<'a, Result<Value, ActionFailure>> {
    Box::pin(async move { summary_value(builder.clean(options).await?) })
}

/// Get the base path from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn site() -> (tempfile::TempDir, Builder) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "documents/index.html.md", "---\ntitle: Hi\nlayout: default\n---\n# Hi\n");
        write(root, "documents/blog/post.html.md", "---\nlayout: post\n---\nA *post*.");
        write(root, "documents/draft.html.md", "---\ndraft: true\n---\nnot yet");
        write(
            root,
            "layouts/default.html.tera",
            "<title>{{ document.title }} - {{ site.name }}</title><main>{{ content }}</main>",
        );
        write(root, "layouts/post.html.tera", "---\nlayout: default\n---\n<article>{{ content }}</article>");
        write(root, "files/robots.txt", "User-agent: *");

        let mut config = Config::default_for("Test Site");
        config.site.url = Some("https://example.com/".into());
        let builder = Builder::new(config, root.to_path_buf()).unwrap();
        (dir, builder)
    }

    fn read(root: &Path, relative: &str) -> String {
        std::fs::read_to_string(root.join(relative)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_writes_the_site() {
        let (dir, builder) = site();
        let summary = builder.generate(&ActionOptions::default()).await.unwrap();

        assert_eq!(summary.documents, 3);
        assert_eq!(summary.layouts, 2);
        assert_eq!(summary.rendered, 3);
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.copied, 1);

        let index = read(dir.path(), "out/index.html");
        assert!(index.starts_with("<title>Hi - Test Site</title><main><h1 id=\"hi\">Hi</h1>"));

        let post = read(dir.path(), "out/blog/post.html");
        assert!(post.contains("<main><article><p>A <em>post</em>.</p>"));
        assert!(post.contains("<title>Post - Test Site</title>"));

        assert!(!dir.path().join("out/draft.html").exists());
        assert_eq!(read(dir.path(), "out/robots.txt"), "User-agent: *");
    }

    #[tokio::test]
    async fn test_regenerate_follows_layout_dependents() {
        let (dir, builder) = site();
        builder.generate(&ActionOptions::default()).await.unwrap();

        write(dir.path(), "layouts/post.html.tera", "---\nlayout: default\n---\n<section>{{ content }}</section>");
        let options = ActionOptions {
            paths: vec!["post.html.tera".into()],
            ..Default::default()
        };
        let summary = builder.regenerate(&options).await.unwrap();

        assert_eq!(summary.rendered, 1);
        assert_eq!(summary.written, 1);
        assert!(read(dir.path(), "out/blog/post.html").contains("<section>"));

        let options = ActionOptions {
            paths: vec!["default.html.tera".into()],
            ..Default::default()
        };
        let summary = builder.regenerate(&options).await.unwrap();
        // index.html.md directly, blog/post.html.md through post.html.tera
        assert_eq!(summary.rendered, 2);
    }

    #[tokio::test]
    async fn test_regenerate_keeps_unaffected_renders() {
        let (dir, builder) = site();
        builder.generate(&ActionOptions::default()).await.unwrap();
        let index = read(dir.path(), "out/index.html");

        write(dir.path(), "layouts/post.html.tera", "---\nlayout: default\n---\n<section>{{ content }}</section>");
        let options = ActionOptions {
            paths: vec!["post.html.tera".into()],
            ..Default::default()
        };
        builder.regenerate(&options).await.unwrap();
        let summary = builder.write(&ActionOptions::default()).await.unwrap();

        assert_eq!(summary.written, 2);
        assert_eq!(read(dir.path(), "out/index.html"), index);
        assert!(read(dir.path(), "out/blog/post.html").contains("<section>"));
    }

    #[tokio::test]
    async fn test_actions_and_clean() {
        let (dir, builder) = site();

        let results = builder
            .action("load contextualize render write", &ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].value["documents"], 3);
        assert!(dir.path().join("out/index.html").exists());

        let dry = ActionOptions {
            dry_run: true,
            ..Default::default()
        };
        let results = builder.action("clean", &dry).await.unwrap();
        assert_eq!(results[0].value["removed"], true);
        assert!(dir.path().join("out").exists());

        builder.action("clean", &ActionOptions::default()).await.unwrap();
        assert!(!dir.path().join("out").exists());

        let err = builder.action("publish", &ActionOptions::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::Unknown { .. }));
    }

    #[tokio::test]
    async fn test_queue_reports_each_bundle() {
        let (_dir, builder) = site();
        let loaded = Cell::new(false);
        let failed_render = Cell::new(false);

        let mut queue = ActionQueue::new();
        queue
            .push("load", ActionOptions::default(), |result| loaded.set(result.is_ok()))
            .push("nope", ActionOptions::default(), |result| failed_render.set(result.is_err()));

        assert_eq!(builder.run_queue(queue).await, 1);
        assert!(loaded.get());
        assert!(failed_render.get());
    }

    #[tokio::test]
    async fn test_render_path_and_helpers() {
        let (dir, builder) = site();
        write(
            dir.path(),
            "documents/links.html.tera",
            "{{ absolute_url(path=\"/feed.xml\") }}",
        );
        builder.load().await.unwrap();

        let output = builder.render_path("links.html.tera").await.unwrap();
        assert_eq!(output, "https://example.com/feed.xml");

        let err = builder.render_path("missing.md").await.unwrap_err();
        assert!(matches!(err, BuildError::UnknownDocument(_)));
    }

    #[tokio::test]
    async fn test_missing_layout_fails_the_render() {
        let (dir, builder) = site();
        write(dir.path(), "documents/broken.html.md", "---\nlayout: nowhere\n---\nx");
        builder.load().await.unwrap();

        let err = builder.render(&ActionOptions::default()).await.unwrap_err();
        assert!(matches!(err, BuildError::Render(RenderError::MissingLayout { .. })));
    }

    #[test]
    fn test_base_path_from_config() {
        assert_eq!(base_path_from_config(Path::new("site/docpress.yaml")), PathBuf::from("site"));
        assert_eq!(base_path_from_config(Path::new("docpress.yaml")), PathBuf::from("."));
    }
}
