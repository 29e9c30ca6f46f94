use crate::{MergedChunk, RawChunk, TimestampRange, TokenId};

/// Shortest token run accepted as a genuine overlap between neighbouring chunks.
pub const MIN_OVERLAP_TOKENS: usize = 2;

pub trait StreamingTokenizer: Send + Sync {
    fn decode(&self, token_ids: &[TokenId]) -> String;

    /// Merges every chunk seen so far into the running text and per-chunk output.
    ///
    /// Adjacent chunks may share a stride of audio, so a chunk can open with the
    /// tokens its predecessor closed on. When the two time ranges overlap, the
    /// longest such run is dropped from the later chunk; chunks that are disjoint
    /// in time keep every token. Chunks left without text are omitted. The result depends only
    /// on `chunks`, which lets callers re-derive it from scratch on every update.
    fn decode_streaming(&self, chunks: &[RawChunk]) -> (String, Vec<MergedChunk>) {
        let mut fresh_chunks: Vec<(&[TokenId], TimestampRange)> = Vec::with_capacity(chunks.len());
        let mut previous: Option<&RawChunk> = None;
        for chunk in chunks {
            let overlap = match previous {
                Some(previous) if overlaps_in_time(previous, chunk) => {
                    longest_overlap(&previous.tokens, &chunk.tokens)
                }
                _ => 0,
            };
            fresh_chunks.push((&chunk.tokens[overlap..], chunk.timestamp));
            previous = Some(chunk);
        }

        let all_tokens: Vec<TokenId> = fresh_chunks
            .iter()
            .flat_map(|(tokens, _)| tokens.iter().copied())
            .collect();
        let running_text = self.decode(&all_tokens).trim().to_string();

        let merged = fresh_chunks
            .into_iter()
            .filter_map(|(tokens, timestamp)| {
                let text = self.decode(tokens).trim().to_string();
                (!text.is_empty()).then_some(MergedChunk { text, timestamp })
            })
            .collect();
        (running_text, merged)
    }
}

/// An open end reaches to the edge of its window, so it covers any later start.
fn overlaps_in_time(previous: &RawChunk, next: &RawChunk) -> bool {
    next.timestamp.start < previous.timestamp.end.unwrap_or(f64::INFINITY)
}

fn longest_overlap(previous: &[TokenId], next: &[TokenId]) -> usize {
    let max = previous.len().min(next.len());
    (MIN_OVERLAP_TOKENS..=max)
        .rev()
        .find(|&len| previous[previous.len() - len..] == next[..len])
        .unwrap_or(0)
}
