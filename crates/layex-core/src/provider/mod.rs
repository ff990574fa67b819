//! Layout providers turn a document into pages of positioned text fragments.

mod json;
mod memory;
mod pdf;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::geometry::Region;

pub use json::{DocumentDump, JsonLayoutProvider};
pub use memory::MemoryLayoutProvider;
pub use pdf::PdfLayoutProvider;

/// One positioned run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub region: Region,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, region: Region) -> Self {
        Self {
            text: text.into(),
            region,
        }
    }

    /// Fragments with only whitespace carry no data.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A page and its fragments, in provider order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed).
    pub number: u32,
    pub fragments: Vec<TextFragment>,
}

/// Trait for layout provider implementations.
///
/// Fragment order within a page must be stable across calls for the same
/// document.
pub trait LayoutProvider: Send + Sync {
    /// Load every page of a document. Any failure to open or decode the
    /// document is reported as [`ProviderError::Unreadable`].
    fn load(&self, path: &Path) -> Result<Vec<Page>, ProviderError>;
}

/// Picks a provider by file extension: `.json` dumps or PDFs.
#[derive(Debug, Clone, Default)]
pub struct AutoLayoutProvider {
    pdf: PdfLayoutProvider,
    json: JsonLayoutProvider,
}

impl AutoLayoutProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayoutProvider for AutoLayoutProvider {
    fn load(&self, path: &Path) -> Result<Vec<Page>, ProviderError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            self.json.load(path)
        } else {
            self.pdf.load(path)
        }
    }
}
