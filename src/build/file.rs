//! A single source file: raw bytes, decoded text and the path metadata
//! derived from its name.

use std::path::{Path, PathBuf};

use crate::util;

/// Encoding used when a file does not declare one.
pub const DEFAULT_ENCODING: &str = "utf8";

#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("unsupported text encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Explicit output settings that take precedence over the computed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOverrides {
    pub out_extension: Option<String>,
    pub out_filename: Option<String>,
    /// Output path relative to the output directory.
    pub out_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileEntity {
    pub full_path: PathBuf,
    /// Slash-separated path relative to the directory the file was found in.
    pub relative_path: String,
    pub relative_dir_path: String,
    /// Relative directory joined with the basename (`blog/post`).
    pub relative_base: String,
    pub filename: String,
    pub basename: String,
    pub extensions: Vec<String>,
    pub out_extension: Option<String>,
    pub out_filename: String,
    pub relative_out_path: String,
    pub url: String,
    /// The primary URL followed by every extra registered URL.
    pub urls: Vec<String>,
    custom_url: Option<String>,
    extra_urls: Vec<String>,
    pub buffer: Vec<u8>,
    pub encoding: String,
    /// Decoded text. For documents this holds the body once parsed.
    pub content: String,
}

impl FileEntity {
    /// Create a file entity, computing its path metadata from `relative_path`.
    pub fn new(relative_path: &str, full_path: impl Into<PathBuf>) -> Self {
        let relative_path = relative_path.replace('\\', "/");
        let (relative_dir_path, filename) = match relative_path.rsplit_once('/') {
            Some((dir, name)) => (dir.to_string(), name.to_string()),
            None => (String::new(), relative_path.clone()),
        };
        let basename = util::basename(&filename);
        let extensions = util::extensions(&filename);

        let mut file = Self {
            full_path: full_path.into(),
            relative_base: util::join_relative(&relative_dir_path, &basename),
            relative_path,
            relative_dir_path,
            filename,
            basename,
            extensions,
            out_extension: None,
            out_filename: String::new(),
            relative_out_path: String::new(),
            url: String::new(),
            urls: Vec::new(),
            custom_url: None,
            extra_urls: Vec::new(),
            buffer: Vec::new(),
            encoding: DEFAULT_ENCODING.to_string(),
            content: String::new(),
        };
        file.normalize(&OutputOverrides::default());
        file
    }

    /// Create an in-memory file from text, without touching the file system.
    pub fn from_text(relative_path: &str, text: &str) -> Self {
        let mut file = Self::new(relative_path, relative_path);
        file.buffer = text.as_bytes().to_vec();
        file.content = text.to_string();
        file
    }

    /// Read the raw bytes of the file from disk.
    pub async fn load(&mut self) -> Result<(), FileError> {
        self.buffer = tokio::fs::read(&self.full_path)
            .await
            .map_err(|source| FileError::Read {
                path: self.full_path.clone(),
                source,
            })?;
        Ok(())
    }

    /// Decode the raw bytes into `content` using the current encoding.
    pub fn decode(&mut self) -> Result<(), FileError> {
        self.content = decode_text(&self.buffer, &self.encoding)
            .ok_or_else(|| FileError::UnsupportedEncoding(self.encoding.clone()))?;
        Ok(())
    }

    /// Recompute the output filename, output path and URL.
    ///
    /// Without an explicit out extension the filename is kept as is.
    pub fn normalize(&mut self, overrides: &OutputOverrides) {
        self.out_extension = overrides
            .out_extension
            .clone()
            .or_else(|| self.extensions.last().cloned());

        self.out_filename = match (&overrides.out_filename, &overrides.out_extension) {
            (Some(name), _) => name.clone(),
            (None, Some(ext)) => util::out_filename(&self.basename, Some(ext)),
            (None, None) => self.filename.clone(),
        };

        self.relative_out_path = match &overrides.out_path {
            Some(path) => path.trim_start_matches('/').to_string(),
            None => util::join_relative(&self.relative_dir_path, &self.out_filename),
        };

        self.url = self
            .custom_url
            .clone()
            .unwrap_or_else(|| util::url_for(&self.relative_out_path));
        self.rebuild_urls();
    }

    /// Replace the primary URL of the file.
    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.custom_url = Some(url.clone());
        self.url = url;
        self.rebuild_urls();
    }

    /// Register an additional URL the file is reachable at.
    pub fn add_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if !self.extra_urls.contains(&url) {
            self.extra_urls.push(url);
        }
        self.rebuild_urls();
    }

    /// Forget URLs set through `set_url` and `add_url`.
    pub fn clear_urls(&mut self) {
        self.custom_url = None;
        self.extra_urls.clear();
        self.url = util::url_for(&self.relative_out_path);
        self.rebuild_urls();
    }

    fn rebuild_urls(&mut self) {
        let mut urls = vec![self.url.clone()];
        for url in &self.extra_urls {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        self.urls = urls;
    }

    /// The path used to identify the file in errors and logs.
    pub fn path_display(&self) -> String {
        self.full_path.display().to_string()
    }

    /// Where the file lands under `out_dir`.
    pub fn out_path(&self, out_dir: &Path) -> PathBuf {
        self.relative_out_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(out_dir.to_path_buf(), |path, segment| path.join(segment))
    }
}

/// Decode bytes with a named text encoding.
///
/// Returns `None` when the encoding is not supported.
pub fn decode_text(bytes: &[u8], encoding: &str) -> Option<String> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf8" | "utf-8" => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        "ascii" => Some(bytes.iter().map(|b| char::from(b & 0x7f)).collect()),
        "latin1" | "binary" | "iso-8859-1" => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        _ => None,
    }
}
