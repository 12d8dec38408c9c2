//! Minimal plain-text loader feeding the ingestion pipeline.
//!
//! Only `.txt` and `.md` files are read. Anything else is reported as unsupported so the caller
//! can count it alongside ingestion failures.

use crate::processing::{IngestionError, SourceRecord};
use std::path::Path;
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Records read from disk plus the paths that could not be loaded.
#[derive(Debug, Default)]
pub struct LoadedSources {
    /// One record per readable file, in walk order.
    pub records: Vec<SourceRecord>,
    /// Unreadable or unsupported paths.
    pub failures: Vec<IngestionError>,
}

/// Load every supported file under `path`. A file path is loaded directly; a directory is walked
/// recursively in name order.
pub fn load_path(path: &Path) -> LoadedSources {
    let mut loaded = LoadedSources::default();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let source_uri = error
                    .path()
                    .unwrap_or(path)
                    .display()
                    .to_string();
                loaded.failures.push(IngestionError::Unreadable {
                    source_uri,
                    reason: error.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        load_file(entry.path(), &mut loaded);
    }
    tracing::debug!(
        path = %path.display(),
        records = loaded.records.len(),
        failures = loaded.failures.len(),
        "Loaded sources"
    );
    loaded
}

fn load_file(path: &Path, loaded: &mut LoadedSources) {
    let source_uri = path.display().to_string();
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        });
    if !supported {
        loaded
            .failures
            .push(IngestionError::Unsupported { source_uri });
        return;
    }

    match std::fs::read_to_string(path) {
        Ok(text) => loaded.records.push(SourceRecord::new(text, source_uri)),
        Err(error) => loaded.failures.push(IngestionError::Unreadable {
            source_uri,
            reason: error.to_string(),
        }),
    }
}
