//! Configuration type definitions.
//!
//! These types are pure data - no I/O.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::build::{GroupPolicy, SingleExtensions};

// =============================================================================
// Root configuration
// =============================================================================

/// The contents of `docpress.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    /// Extra values templates see next to `site`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub template_data: Map<String, Value>,
}

// =============================================================================
// Site configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            url: None,
        }
    }
}

// =============================================================================
// Source and output paths
// =============================================================================

/// Directories, relative to the config file unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_documents")]
    pub documents: Vec<PathBuf>,
    #[serde(default = "default_layouts")]
    pub layouts: Vec<PathBuf>,
    #[serde(default = "default_files")]
    pub files: Vec<PathBuf>,
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_documents() -> Vec<PathBuf> {
    vec![PathBuf::from("documents")]
}

fn default_layouts() -> Vec<PathBuf> {
    vec![PathBuf::from("layouts")]
}

fn default_files() -> Vec<PathBuf> {
    vec![PathBuf::from("files")]
}

fn default_out() -> PathBuf {
    PathBuf::from("out")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents: default_documents(),
            layouts: default_layouts(),
            files: default_files(),
            out: default_out(),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Site-wide default, documents override it in their meta-data.
    #[serde(default)]
    pub render_single_extensions: SingleExtensions,
    /// How many layouts may wrap a single document.
    #[serde(default = "default_max_layout_depth")]
    pub max_layout_depth: usize,
    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,
    /// Where to write the highlight theme's CSS, relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_stylesheet: Option<String>,
}

fn default_max_layout_depth() -> usize {
    32
}

fn default_highlight_theme() -> String {
    "github-dark".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_single_extensions: SingleExtensions::default(),
            max_layout_depth: default_max_layout_depth(),
            highlight_theme: default_highlight_theme(),
            highlight_stylesheet: None,
        }
    }
}

// =============================================================================
// Markdown configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Extensions to enable for markdown processing
    #[serde(default = "default_markdown_extensions")]
    pub extensions: Vec<String>,
}

fn default_markdown_extensions() -> Vec<String> {
    vec![
        "definition_lists".to_string(),
        "footnotes".to_string(),
        "gfm".to_string(),
        "heading_attributes".to_string(),
        "strikethrough".to_string(),
        "tables".to_string(),
        "tasklists".to_string(),
    ]
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: default_markdown_extensions(),
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// How several actions named together are scheduled.
    #[serde(default)]
    pub group_policy: GroupPolicy,
}
