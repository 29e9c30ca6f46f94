use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use scribe_domain::TokenId;

/// Raw token bytes learned from decoded segments.
///
/// Byte-level BPE may split one UTF-8 character over several tokens, so text
/// is only recovered after the bytes of a whole token run are joined.
#[derive(Debug, Default)]
pub struct Vocabulary {
    pieces: RwLock<HashMap<TokenId, Vec<u8>>>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, pieces: impl IntoIterator<Item = (TokenId, Vec<u8>)>) {
        self.pieces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(pieces);
    }

    /// Unknown ids are skipped.
    pub fn decode(&self, token_ids: &[TokenId]) -> String {
        let pieces = self.pieces.read().unwrap_or_else(PoisonError::into_inner);
        let bytes: Vec<u8> = token_ids
            .iter()
            .filter_map(|id| pieces.get(id))
            .flat_map(|piece| piece.iter().copied())
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.pieces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_split_across_tokens_is_rejoined() {
        let bytes = "日本".as_bytes();
        let vocabulary = Vocabulary::new();
        vocabulary.extend([
            (1, bytes[..2].to_vec()),
            (2, bytes[2..4].to_vec()),
            (3, bytes[4..].to_vec()),
        ]);

        assert_eq!(vocabulary.decode(&[1, 2, 3]), "日本");
        assert_eq!(vocabulary.len(), 3);
    }

    #[test]
    fn unknown_ids_and_dangling_bytes() {
        let vocabulary = Vocabulary::new();
        vocabulary.extend([(7, b" hi".to_vec()), (8, vec![0xE6])]);

        assert_eq!(vocabulary.decode(&[7, 99]), " hi");
        assert_eq!(vocabulary.decode(&[7, 8]), " hi\u{FFFD}");
        assert!(Vocabulary::new().is_empty());
    }
}
