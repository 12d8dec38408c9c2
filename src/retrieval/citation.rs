use crate::processing::{
    sanitize::source_filename,
    types::{ChunkMetadata, Locator},
};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Reference to the document (and position) an answer draws on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Citation {
    /// Basename of the source document.
    pub source_filename: String,
    /// Optional page, slide or row.
    pub locator: Option<Locator>,
}

impl Citation {
    /// Build a citation from stored chunk metadata.
    pub fn from_metadata(metadata: &ChunkMetadata) -> Self {
        Self {
            source_filename: source_filename(&metadata.source_uri).to_string(),
            locator: metadata.locator,
        }
    }
}

/// Renders `[Source: report.pdf, Page 3]`.
impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.locator {
            Some(locator) => write!(f, "[Source: {}, {locator}]", self.source_filename),
            None => write!(f, "[Source: {}]", self.source_filename),
        }
    }
}

/// Drop repeated `(filename, locator)` pairs, keeping the first occurrence of each.
pub fn dedupe_citations(citations: impl IntoIterator<Item = Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|citation| seen.insert(citation.clone()))
        .collect()
}
