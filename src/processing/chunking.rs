//! Character-budget chunking with exact overlap.
//!
//! Text is cut into windows of at most `max_size` characters. Inside each window the cut point is
//! chosen by separator priority: paragraph break, line break, word boundary, and finally a raw
//! character cut when no separator fits. The next chunk always starts `overlap` characters
//! before the previous cut, so neighbouring chunks share exactly `overlap` characters and the
//! original text can be rebuilt by dropping the trailing overlap of every chunk but the last.
//!
//! Sizes are measured in Unicode scalar values, never bytes, so cuts cannot split a code point.

use sha2::{Digest, Sha256};

use super::types::{Chunk, ChunkMetadata, ChunkingError, ChunkingSettings, Locator, SourceRecord};

/// Separators tried in priority order before falling back to a raw character cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split `text` into overlapping chunks according to `settings`.
///
/// Returns an empty vector when the input is empty or whitespace only.
pub fn split_text(text: &str, settings: ChunkingSettings) -> Result<Vec<String>, ChunkingError> {
    validate_settings(settings)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let separators: Vec<Vec<char>> = SEPARATORS
        .iter()
        .map(|separator| separator.chars().collect())
        .collect();

    let ChunkingSettings { max_size, overlap } = settings;
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let window_end = start + max_size;
        if window_end >= total {
            chunks.push(text[offsets[start]..].to_string());
            break;
        }

        // Cuts must land past `start + overlap`, otherwise the next chunk would not advance.
        let min_end = start + overlap + 1;
        let end = separators
            .iter()
            .find_map(|separator| last_separator_end(&chars, separator, min_end, window_end))
            .unwrap_or(window_end);

        chunks.push(text[offsets[start]..offsets[end]].to_string());
        start = end - overlap;
    }

    Ok(chunks)
}

/// Chunk a source record, copying its provenance onto every chunk.
pub fn chunk_record(
    record: &SourceRecord,
    settings: ChunkingSettings,
    ingested_at: Option<&str>,
) -> Result<Vec<Chunk>, ChunkingError> {
    let pieces = split_text(&record.text, settings)?;
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            id: chunk_id(&record.source_uri, record.locator, sequence_index),
            metadata: ChunkMetadata {
                text,
                source_uri: record.source_uri.clone(),
                locator: record.locator,
                sequence_index,
                ingested_at: ingested_at.map(str::to_string),
            },
        })
        .collect())
}

/// Deterministic identifier for the `sequence_index`-th chunk of a record.
///
/// Re-ingesting the same source yields the same ids, so upserts replace prior chunks.
pub fn chunk_id(source_uri: &str, locator: Option<Locator>, sequence_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_uri.as_bytes());
    hasher.update([0u8]);
    match locator {
        Some(locator) => hasher.update(locator.to_string().as_bytes()),
        None => hasher.update(b"-"),
    }
    hasher.update([0u8]);
    hasher.update(sequence_index.to_le_bytes());
    hex::encode(hasher.finalize())
}

fn validate_settings(settings: ChunkingSettings) -> Result<(), ChunkingError> {
    if settings.max_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if settings.overlap >= settings.max_size {
        return Err(ChunkingError::OverlapTooLarge {
            overlap: settings.overlap,
            max_size: settings.max_size,
        });
    }
    Ok(())
}

/// Find the largest cut position in `min_end..=max_end` that immediately follows `separator`.
fn last_separator_end(
    chars: &[char],
    separator: &[char],
    min_end: usize,
    max_end: usize,
) -> Option<usize> {
    let lowest = min_end.max(separator.len());
    (lowest..=max_end)
        .rev()
        .find(|&end| chars[end - separator.len()..end] == *separator)
}
