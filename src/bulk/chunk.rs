/// Split `ids` into non-overlapping, order-preserving windows of at most
/// `chunk_size` items; the final window may be shorter. Each window is one
/// transactional unit for the mutation executors.
///
/// `chunk_size` must be non-zero.
pub fn chunked(ids: &[i64], chunk_size: usize) -> impl Iterator<Item = &[i64]> {
    assert!(chunk_size > 0, "chunk_size must be positive");
    ids.chunks(chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiple_yields_one_chunk() {
        let ids: Vec<i64> = (1..=50).collect();
        let chunks: Vec<_> = chunked(&ids, 50).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 50);
    }

    #[test]
    fn one_past_the_boundary_yields_a_short_tail() {
        let ids: Vec<i64> = (1..=51).collect();
        let chunks: Vec<_> = chunked(&ids, 50).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 50);
        assert_eq!(chunks[1], &[51]);
    }

    #[test]
    fn every_id_appears_exactly_once_in_order() {
        let ids: Vec<i64> = (1..=17).collect();
        let flattened: Vec<i64> = chunked(&ids, 5).flatten().copied().collect();
        assert_eq!(flattened, ids);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert_eq!(chunked(&[], 50).count(), 0);
    }
}
