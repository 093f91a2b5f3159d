use proptest::prelude::*;
use tenk_core::{window_bounds, Chunker, ChunkerConfig};

proptest! {
    #[test]
    fn windows_tile_the_token_stream(
        total in 0usize..10_000,
        chunk_size in 2usize..512,
        overlap_frac in 0usize..100,
    ) {
        // Keep overlap strictly below chunk_size.
        let overlap = (chunk_size - 1) * overlap_frac / 100;
        let bounds = window_bounds(total, chunk_size, overlap);

        if total == 0 {
            prop_assert!(bounds.is_empty());
            return Ok(());
        }
        prop_assert_eq!(bounds[0].0, 0);
        prop_assert_eq!(bounds.last().unwrap().1, total);
        for &(start, end) in &bounds {
            prop_assert!(start < end);
            prop_assert!(end - start <= chunk_size);
        }
        // Every window but the last is full-size and shares exactly
        // `overlap` tokens with its successor.
        for pair in bounds.windows(2) {
            let (prev_start, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            prop_assert_eq!(prev_end - prev_start, chunk_size);
            prop_assert_eq!(prev_end - next_start, overlap);
        }
    }

    #[test]
    fn chunk_count_is_deterministic(
        text in "[a-z ]{0,2000}",
        chunk_size in 8usize..128,
    ) {
        let config = ChunkerConfig { chunk_size, overlap: chunk_size / 4 };
        let chunker = Chunker::new(config).unwrap();
        let a = chunker.chunk(&text, "ITEM_1", 1).unwrap();
        let b = chunker.chunk(&text, "ITEM_1", 1).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn zero_overlap_reconstructs_input(text in "[ -~]{1,1500}") {
        let chunker = Chunker::new(ChunkerConfig { chunk_size: 32, overlap: 0 }).unwrap();
        let chunks = chunker.chunk(&text, "ITEM_7", 1).unwrap();
        if text.trim().is_empty() {
            prop_assert!(chunks.is_empty());
        } else {
            let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(rebuilt, text);
        }
    }
}
