use std::path::{Path, PathBuf};

use tracing::{debug, warn};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("source path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read directory entry in {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        source: std::io::Error,
    },
}

// =============================================================================
// Source directories
// =============================================================================

/// What a source directory holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Documents,
    Layouts,
    /// Static files, copied through unchanged.
    Files,
}

/// A configured source directory, resolved against the project root.
#[derive(Debug, Clone)]
pub struct SourceDir {
    pub kind: SourceKind,
    pub path: PathBuf,
}

/// A file found in a source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Slash-separated path relative to the source directory.
    pub relative_path: String,
    pub full_path: PathBuf,
}

impl SourceDir {
    pub fn resolve(kind: SourceKind, path: &Path, base_path: &Path) -> Self {
        let path = if path.is_relative() {
            base_path.join(path)
        } else {
            path.to_path_buf()
        };
        Self { kind, path }
    }

    /// Every file under the directory, sorted by relative path.
    ///
    /// A missing directory holds nothing.
    pub fn discover(&self) -> Result<Vec<SourceEntry>, SourceError> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), kind = ?self.kind, "source directory does not exist");
            return Ok(Vec::new());
        }
        if !self.path.is_dir() {
            return Err(SourceError::NotADirectory(self.path.clone()));
        }

        let mut entries = Vec::new();
        walk_directory(&self.path, "", &mut entries)?;
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        debug!(path = %self.path.display(), files = entries.len(), "discovered source files");
        Ok(entries)
    }
}

/// Recursively walk a directory and collect its files.
fn walk_directory(dir: &Path, relative_dir: &str, entries: &mut Vec<SourceEntry>) -> Result<(), SourceError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| SourceError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in read_dir {
        let entry = entry.map_err(|e| SourceError::ReadEntry {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let relative_path = crate::util::join_relative(relative_dir, &file_name);

        if path.is_dir() {
            // Hidden and tooling directories never hold site content
            if file_name.starts_with('.') || matches!(file_name.as_ref(), "node_modules" | "__pycache__" | "target") {
                continue;
            }
            walk_directory(&path, &relative_path, entries)?;
        } else if path.is_file() {
            // Dotfiles such as .htaccess are content, editor leftovers are not
            if is_junk(&file_name) {
                continue;
            }
            entries.push(SourceEntry {
                relative_path,
                full_path: path,
            });
        }
    }

    Ok(())
}

fn is_junk(file_name: &str) -> bool {
    matches!(file_name, ".DS_Store" | "Thumbs.db" | "desktop.ini")
        || file_name.ends_with('~')
        || file_name.ends_with(".swp")
        || file_name.starts_with(".#")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_discover_walks_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "index.html.md");
        touch(dir.path(), "blog/b.html.md");
        touch(dir.path(), "blog/a.html.md");
        touch(dir.path(), ".htaccess");

        let source = SourceDir::resolve(SourceKind::Documents, Path::new("."), dir.path());
        let found: Vec<_> = source
            .discover()
            .unwrap()
            .into_iter()
            .map(|entry| entry.relative_path)
            .collect();

        assert_eq!(found, vec![".htaccess", "blog/a.html.md", "blog/b.html.md", "index.html.md"]);
    }

    #[test]
    fn test_discover_skips_hidden_dirs_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "keep.txt");
        touch(dir.path(), ".git/config");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), ".DS_Store");
        touch(dir.path(), "notes.md~");
        touch(dir.path(), ".notes.md.swp");

        let source = SourceDir::resolve(SourceKind::Files, dir.path(), Path::new("/elsewhere"));
        let found = source.discover().unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative_path, "keep.txt");
        assert_eq!(found[0].full_path, dir.path().join("keep.txt"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceDir::resolve(SourceKind::Layouts, Path::new("layouts"), dir.path());
        assert!(source.discover().unwrap().is_empty());
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "layouts");
        let source = SourceDir::resolve(SourceKind::Layouts, Path::new("layouts"), dir.path());
        assert!(matches!(source.discover(), Err(SourceError::NotADirectory(_))));
    }
}
