//! Error types for the layex-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the layex library.
#[derive(Error, Debug)]
pub enum LayexError {
    /// Layout configuration error.
    #[error("layout error: {0}")]
    Schema(#[from] SchemaError),

    /// Layout provider error.
    #[error("layout provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while loading or validating a layout configuration.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The layout file could not be read or written.
    #[error("failed to access layout {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The layout file is not valid YAML for the expected shape.
    #[error("malformed layout: {0}")]
    Malformed(#[from] serde_yaml::Error),

    /// Two page types share a name.
    #[error("duplicate page type: {0}")]
    DuplicatePageType(String),

    /// A field name collides with record metadata.
    #[error("field {field} on page type {page_type} uses a reserved name")]
    ReservedFieldName { page_type: String, field: String },

    /// A region is not four finite numbers.
    #[error("invalid region for {owner}: {reason}")]
    InvalidRegion { owner: String, reason: String },

    /// Converter identifier not known.
    #[error("unknown converter {name} for field {field}")]
    UnknownConverter { field: String, name: String },

    /// Two page-type predicates can match the same page.
    #[error("page types {first} and {second} can both match the same page")]
    AmbiguousPageTypes { first: String, second: String },

    /// Field already declared on a page type.
    #[error("field {field} already exists on page type {page_type}")]
    DuplicateField { page_type: String, field: String },

    /// Page type or field referenced but not declared.
    #[error("no such {kind}: {name}")]
    NotFound { kind: &'static str, name: String },
}

/// Errors raised by layout providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The document could not be opened or decoded at all.
    #[error("unreadable document {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
}

impl ProviderError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ProviderError::Unreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Raised when a converter cannot turn raw fragment text into a typed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert {text:?} with {converter}: {reason}")]
pub struct ConversionError {
    pub converter: &'static str,
    pub text: String,
    pub reason: String,
}

impl ConversionError {
    pub fn new(converter: &'static str, text: &str, reason: impl ToString) -> Self {
        Self {
            converter,
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by record stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing a shard failed.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shard could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record has no case identifier.
    #[error("record without case_id in {}", .0.display())]
    MissingKey(PathBuf),

    /// Writing to a record stream failed.
    #[error("failed to write record stream: {0}")]
    Stream(#[source] std::io::Error),
}

/// Result type for the layex library.
pub type Result<T> = std::result::Result<T, LayexError>;
