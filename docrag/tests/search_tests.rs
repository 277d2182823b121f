//! Property tests for exact vector search ordering.

use docrag::index::VectorIndex;
use proptest::prelude::*;

/// Generate a vector of small, exactly representable components.
fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec((-64i32..64).prop_map(|x| x as f32 / 8.0), dim)
}

fn arb_entries(dim: usize) -> impl Strategy<Value = Vec<(String, Vec<f32>)>> {
    proptest::collection::vec(("[a-z ]{5,30}", arb_vector(dim)), 1..20)
}

/// *For any* index and query, search SHALL return `min(k, len)` results in
/// ascending distance order with ties broken by chunk index, ranks 1..n,
/// and scores `1 / (1 + distance)` within `(0, 1]`.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_are_ranked_and_bounded(
            entries in arb_entries(DIM),
            query in arb_vector(DIM),
            k in 1usize..25,
        ) {
            let count = entries.len();
            let index = VectorIndex::build(entries).unwrap();
            let results = index.search(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(count));
            for (position, result) in results.iter().enumerate() {
                prop_assert_eq!(result.rank, position + 1);
                prop_assert!(result.similarity_score > 0.0 && result.similarity_score <= 1.0);
                let expected = (1.0 / (1.0 + f64::from(result.distance))) as f32;
                prop_assert_eq!(result.similarity_score, expected);
            }
            for window in results.windows(2) {
                prop_assert!(
                    window[0].distance < window[1].distance
                        || (window[0].distance == window[1].distance
                            && window[0].chunk_index < window[1].chunk_index),
                    "results out of order: {:?} then {:?}",
                    window[0],
                    window[1],
                );
            }
        }

        #[test]
        fn searching_a_stored_vector_finds_it_first(
            entries in arb_entries(DIM),
            pick in any::<prop::sample::Index>(),
        ) {
            let index = VectorIndex::build(entries).unwrap();
            let target = pick.index(index.len());
            let query = index.chunks()[target].vector().to_vec();
            let results = index.search(&query, 1).unwrap();

            prop_assert_eq!(results[0].similarity_score, 1.0);
            // Duplicate vectors resolve to the lowest index holding that vector.
            let first_equal = index
                .chunks()
                .iter()
                .position(|c| c.vector() == query.as_slice())
                .unwrap();
            prop_assert_eq!(results[0].chunk_index, first_equal);
        }

        #[test]
        fn search_is_deterministic(
            entries in arb_entries(DIM),
            query in arb_vector(DIM),
            k in 1usize..25,
        ) {
            let index = VectorIndex::build(entries).unwrap();
            prop_assert_eq!(index.search(&query, k).unwrap(), index.search(&query, k).unwrap());
        }
    }
}
