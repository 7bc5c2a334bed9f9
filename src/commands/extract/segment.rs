use crate::model::ListingChunk;

/// Splits a document into listing chunks, each starting at an occurrence of
/// `delimiter`. Text before the first delimiter is front matter and dropped.
pub fn segment(full_text: &str, delimiter: &str) -> Vec<ListingChunk> {
    if delimiter.is_empty() {
        return Vec::new();
    }

    let starts: Vec<usize> = full_text
        .match_indices(delimiter)
        .map(|(offset, _)| offset)
        .collect();

    let mut chunks = Vec::with_capacity(starts.len());
    for (position, start) in starts.iter().enumerate() {
        let end = starts
            .get(position + 1)
            .copied()
            .unwrap_or(full_text.len());
        let text = full_text[*start..end].trim();
        if text.is_empty() {
            continue;
        }
        chunks.push(ListingChunk {
            index: chunks.len() + 1,
            text: text.to_string(),
        });
    }

    chunks
}
