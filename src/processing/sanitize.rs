//! Helpers for normalizing source identifiers and user input.

/// Final path component of a source identifier, accepting both `/` and `\` separators.
///
/// Identifiers that are not path shaped are returned unchanged.
pub fn source_filename(source_uri: &str) -> &str {
    let trimmed = source_uri.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(trimmed)
}

/// Whether a filename looks like a temporary upload name (`tmp_ab12.pdf`, `tmpx8k2...pdf`).
pub fn is_temporary_upload(filename: &str) -> bool {
    filename.starts_with("tmp") && (filename.contains('_') || filename.chars().count() > 20)
}
