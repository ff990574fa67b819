//! Mapping between document file names and case identifiers.

use std::path::Path;

/// Extension of source documents in the archive.
pub const DOCUMENT_EXTENSION: &str = "PDF";

/// `AB1234.PDF` becomes `AB-1234`.
///
/// The first two characters of the file stem form the agency prefix and are
/// joined to the rest with a hyphen.
pub fn filename_to_case_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let split = stem.char_indices().nth(2).map_or(stem.len(), |(i, _)| i);
    let (prefix, rest) = stem.split_at(split);
    format!("{prefix}-{rest}")
}

/// `ab-1234` becomes `AB1234.PDF`.
pub fn case_id_to_filename(case_id: &str) -> String {
    format!(
        "{}.{}",
        case_id.replace('-', "").to_uppercase(),
        DOCUMENT_EXTENSION
    )
}

/// File name component of a path, for storing on records.
pub fn display_filename(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
