//! Core library for layout-driven field extraction.
//!
//! This crate provides:
//! - Region geometry with fuzz-tolerant containment
//! - Layout schemas (page types, field and skip regions) loaded from YAML
//! - Page classification and fragment-to-field resolution
//! - Typed converters for dates, times, checkboxes and coded values
//! - A document parser with batch and interactive (teaching) modes
//! - A threaded pipeline that stores records in batches with backpressure

pub mod classify;
pub mod convert;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod models;
pub mod naming;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod resolve;
pub mod store;

pub use classify::{classify, Classification};
pub use convert::{Converter, ConverterSpec};
pub use editor::{Candidate, EditDecision, SchemaEditor, ScriptedEditor, Unresolved};
pub use error::{
    ConversionError, LayexError, ProviderError, Result, SchemaError, StoreError,
};
pub use geometry::{Region, DEFAULT_FUZZ};
pub use layout::{FieldDefinition, LayoutSchema, PageType};
pub use models::{FieldValue, LayexConfig, ParsedRecord, UnparsedEntry};
pub use naming::{case_id_to_filename, filename_to_case_id};
pub use parser::DocumentParser;
pub use pipeline::{Orchestrator, PipelineOptions, RunStatus, RunSummary, Shutdown};
pub use provider::{
    AutoLayoutProvider, JsonLayoutProvider, LayoutProvider, MemoryLayoutProvider, Page,
    PdfLayoutProvider, TextFragment,
};
pub use resolve::{FieldResolver, Resolution};
pub use store::{JsonLinesStore, JsonRecordStore, RecordStore};
