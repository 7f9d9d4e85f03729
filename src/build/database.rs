//! In-memory store of the site's documents, layouts and static files.
//!
//! The render pipeline only sees this through [`DocumentLookup`], which
//! always hands out owned copies: rendering a layout never touches the
//! stored one.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::document::Document;
use super::file::FileEntity;

#[derive(thiserror::Error, Debug)]
pub enum LookupError {
    #[error("the document database is unavailable: a writer panicked while holding its lock")]
    Poisoned,

    #[error("lookup failed: {0}")]
    Backend(String),
}

/// Which set of documents a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Documents,
    Layouts,
}

/// A document attribute that queries can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RelativePath,
    RelativeBase,
    RelativeOutPath,
    Url,
    FullPath,
}

impl Field {
    fn value(self, document: &Document) -> String {
        match self {
            Field::RelativePath => document.file.relative_path.clone(),
            Field::RelativeBase => document.file.relative_base.clone(),
            Field::RelativeOutPath => document.file.relative_out_path.clone(),
            Field::Url => document.file.url.clone(),
            Field::FullPath => document.file.full_path.to_string_lossy().replace('\\', "/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Equals(Field, String),
    StartsWith(Field, String),
    All(Vec<Filter>),
}

impl Filter {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Equals(field, expected) => field.value(document) == *expected,
            Filter::StartsWith(field, prefix) => field.value(document).starts_with(prefix.as_str()),
            Filter::All(filters) => filters.iter().all(|filter| filter.matches(document)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: Field,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    pub offset: usize,
}

/// Query access to documents and layouts.
pub trait DocumentLookup: Send + Sync {
    /// The first document matching `filter`, after sorting and paging.
    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
        paging: Option<&Paging>,
    ) -> Result<Option<Document>, LookupError>;

    /// Find a layout from a loose selector.
    ///
    /// Tried in order: exact relative path, relative base, URL, then prefix
    /// matches on relative path, full path and URL.
    fn find_layout(&self, selector: &str) -> Result<Option<Document>, LookupError> {
        let queries = [
            Filter::Equals(Field::RelativePath, selector.to_string()),
            Filter::Equals(Field::RelativeBase, selector.to_string()),
            Filter::Equals(Field::Url, selector.to_string()),
            Filter::StartsWith(Field::RelativePath, selector.to_string()),
            Filter::StartsWith(Field::FullPath, selector.to_string()),
            Filter::StartsWith(Field::Url, selector.to_string()),
        ];
        let sort = Sort {
            field: Field::RelativePath,
            descending: false,
        };

        for query in &queries {
            if let Some(layout) = self.find_one(Collection::Layouts, query, Some(&sort), None)? {
                return Ok(Some(layout));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Default)]
pub struct Database {
    documents: RwLock<Vec<Document>>,
    layouts: RwLock<Vec<Document>>,
    files: RwLock<Vec<FileEntity>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, collection: Collection) -> &RwLock<Vec<Document>> {
        match collection {
            Collection::Documents => &self.documents,
            Collection::Layouts => &self.layouts,
        }
    }

    fn read(&self, collection: Collection) -> Result<RwLockReadGuard<'_, Vec<Document>>, LookupError> {
        self.collection(collection)
            .read()
            .map_err(|_| LookupError::Poisoned)
    }

    fn write(&self, collection: Collection) -> Result<RwLockWriteGuard<'_, Vec<Document>>, LookupError> {
        self.collection(collection)
            .write()
            .map_err(|_| LookupError::Poisoned)
    }

    /// Insert a document, replacing any with the same relative path.
    pub fn upsert(&self, collection: Collection, document: Document) -> Result<(), LookupError> {
        let mut documents = self.write(collection)?;
        match documents
            .iter_mut()
            .find(|existing| existing.file.relative_path == document.file.relative_path)
        {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        Ok(())
    }

    /// Replace the whole contents of a collection.
    pub fn replace_all(&self, collection: Collection, documents: Vec<Document>) -> Result<(), LookupError> {
        *self.write(collection)? = documents;
        Ok(())
    }

    /// A copy of every document in a collection.
    pub fn all(&self, collection: Collection) -> Result<Vec<Document>, LookupError> {
        Ok(self.read(collection)?.clone())
    }

    /// A copy of the document at `relative_path`.
    pub fn get(&self, collection: Collection, relative_path: &str) -> Result<Option<Document>, LookupError> {
        self.find_one(
            collection,
            &Filter::Equals(Field::RelativePath, relative_path.to_string()),
            None,
            None,
        )
    }

    pub fn replace_files(&self, files: Vec<FileEntity>) -> Result<(), LookupError> {
        *self.files.write().map_err(|_| LookupError::Poisoned)? = files;
        Ok(())
    }

    pub fn files(&self) -> Result<Vec<FileEntity>, LookupError> {
        Ok(self.files.read().map_err(|_| LookupError::Poisoned)?.clone())
    }
}

impl DocumentLookup for Database {
    fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
        paging: Option<&Paging>,
    ) -> Result<Option<Document>, LookupError> {
        let documents = self.read(collection)?;
        let mut matches: Vec<&Document> = documents.iter().filter(|doc| filter.matches(doc)).collect();

        if let Some(sort) = sort {
            matches.sort_by_cached_key(|doc| sort.field.value(doc));
            if sort.descending {
                matches.reverse();
            }
        }

        let offset = paging.map(|paging| paging.offset).unwrap_or(0);
        Ok(matches.into_iter().nth(offset).cloned())
    }
}
