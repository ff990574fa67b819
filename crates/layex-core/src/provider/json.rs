//! Pre-extracted fragment dumps.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LayoutProvider, Page};
use crate::error::ProviderError;

/// On-disk shape of a fragment dump, as written by `layex dump --format json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDump {
    pub pages: Vec<Page>,
}

/// Reads [`DocumentDump`] files.
#[derive(Debug, Clone, Default)]
pub struct JsonLayoutProvider;

impl JsonLayoutProvider {
    pub fn new() -> Self {
        Self
    }
}

impl LayoutProvider for JsonLayoutProvider {
    fn load(&self, path: &Path) -> Result<Vec<Page>, ProviderError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ProviderError::unreadable(path, e))?;
        let dump: DocumentDump =
            serde_json::from_str(&content).map_err(|e| ProviderError::unreadable(path, e))?;
        debug!("Loaded {} pages from dump {}", dump.pages.len(), path.display());
        Ok(dump.pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = JsonLayoutProvider::new()
            .load(Path::new("/nonexistent/XY1.json"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unreadable { .. }));
    }

    #[test]
    fn test_malformed_dump_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("XY1.json");
        std::fs::write(&path, r#"{"pages": 3}"#).unwrap();
        assert!(JsonLayoutProvider::new().load(&path).is_err());
    }
}
