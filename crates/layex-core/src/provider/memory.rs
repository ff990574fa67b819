//! Provider backed by pages held in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{LayoutProvider, Page};
use crate::error::ProviderError;

/// Serves pre-built pages keyed by path. Paths not registered are unreadable.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayoutProvider {
    documents: HashMap<PathBuf, Vec<Page>>,
}

impl MemoryLayoutProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>, pages: Vec<Page>) -> Self {
        self.insert(path, pages);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, pages: Vec<Page>) {
        self.documents.insert(path.into(), pages);
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.documents.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl LayoutProvider for MemoryLayoutProvider {
    fn load(&self, path: &Path) -> Result<Vec<Page>, ProviderError> {
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::unreadable(path, "no such document"))
    }
}
