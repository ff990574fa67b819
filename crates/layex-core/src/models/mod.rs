//! Data models: records and configuration.

pub mod config;
pub mod record;

pub use config::{LayexConfig, ParseConfig, PathsConfig};
pub use record::{FieldErrorKind, FieldValue, ParsedRecord, UnparsedEntry, RESERVED_KEYS};
