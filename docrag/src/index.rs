//! Exact nearest-neighbor index over one document's chunk vectors.
//!
//! [`VectorIndex`] is an immutable value: it is built once from a document's
//! chunk embeddings and then only read. Searching is a linear scan computing
//! squared Euclidean distance to every chunk, which is exact and fast for the
//! tens to low thousands of chunks a single document produces. Callers depend
//! only on [`VectorIndex::build`] and [`VectorIndex::search`], so an
//! approximate structure can replace the scan without touching them.

use std::cmp::Ordering;

use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// An immutable set of chunk vectors sharing one dimension.
///
/// Chunk order is creation order and `chunk.index()` equals the chunk's
/// position. Share it across tasks as `Arc<VectorIndex>`; replacing an index
/// means building a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    chunks: Vec<Chunk>,
}

/// Squared Euclidean distance between two equal-length vectors.
///
/// Accumulates in `f64` and saturates at `f32::MAX`, so finite inputs always
/// yield a finite distance.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();
    sum.min(f64::from(f32::MAX)) as f32
}

/// Map a distance onto `(0, 1]`. Identical vectors score exactly 1.0.
fn similarity(distance: f32) -> f32 {
    (1.0 / (1.0 + f64::from(distance))) as f32
}

fn ensure_finite(vector: &[f32], describe: impl FnOnce() -> String) -> Result<()> {
    if vector.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(RagError::NonFiniteVector { vector: describe() })
    }
}

/// Ascending distance, ties broken by lower chunk index.
fn by_distance_then_index(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

impl VectorIndex {
    /// Build an index from `(text, vector)` pairs in chunk order.
    ///
    /// The first vector fixes the index dimension.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyInput`] if `entries` is empty or the first vector has
    ///   zero length
    /// - [`RagError::DimensionMismatch`] if any vector's length differs from
    ///   the first
    /// - [`RagError::NonFiniteVector`] if any component is NaN or infinite
    pub fn build<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        let mut dimension = None;
        let mut chunks = Vec::new();

        for (index, (text, vector)) in entries.into_iter().enumerate() {
            let expected = *dimension.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
            }
            ensure_finite(&vector, || format!("chunk {index}"))?;
            chunks.push(Chunk { index, text: text.into(), vector });
        }

        match dimension {
            Some(dimension) if dimension > 0 => Ok(Self { dimension, chunks }),
            _ => Err(RagError::EmptyInput),
        }
    }

    /// The length shared by every chunk vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The chunks in creation order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The chunk texts in creation order.
    pub fn chunk_texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(Chunk::text)
    }

    /// Return the `k` chunks nearest to `query`, nearest first.
    ///
    /// Returns `min(k, self.len())` results ranked from 1. Equal distances
    /// are ordered by chunk index, so repeated searches return identical
    /// results.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if `query.len() != self.dimension()`
    /// - [`RagError::NonFiniteVector`] if `query` has a NaN or infinite component
    /// - [`RagError::ConfigError`] if `k == 0`
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        ensure_finite(query, || "query".to_string())?;
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .map(|chunk| (chunk.index, squared_l2(&chunk.vector, query)))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_index);
            scored.truncate(k);
        }
        scored.sort_by(by_distance_then_index);

        let results: Vec<SearchResult> = scored
            .into_iter()
            .enumerate()
            .map(|(position, (index, distance))| SearchResult {
                chunk_index: index,
                chunk_text: self.chunks[index].text.clone(),
                distance,
                similarity_score: similarity(distance),
                rank: position + 1,
            })
            .collect();

        debug!(chunk_count = self.chunks.len(), k, result_count = results.len(), "searched index");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VectorIndex {
        VectorIndex::build(vec![
            ("zero", vec![0.0, 0.0]),
            ("one", vec![1.0, 0.0]),
            ("two", vec![0.0, 2.0]),
            ("far", vec![10.0, 10.0]),
        ])
        .unwrap()
    }

    #[test]
    fn build_rejects_empty_input() {
        let entries: Vec<(String, Vec<f32>)> = Vec::new();
        assert!(matches!(VectorIndex::build(entries), Err(RagError::EmptyInput)));
    }

    #[test]
    fn build_rejects_zero_length_vectors() {
        assert!(matches!(VectorIndex::build(vec![("a", Vec::new())]), Err(RagError::EmptyInput)));
    }

    #[test]
    fn build_rejects_mixed_dimensions() {
        let err = VectorIndex::build(vec![("a", vec![1.0, 2.0]), ("b", vec![1.0])]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn build_assigns_positional_indices() {
        let index = sample();
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.len(), 4);
        for (position, chunk) in index.chunks().iter().enumerate() {
            assert_eq!(chunk.index(), position);
        }
    }

    #[test]
    fn exact_match_ranks_first_with_unit_score() {
        let index = sample();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].chunk_text, "one");
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].similarity_score, 1.0);
        assert_eq!(results[1].chunk_text, "zero");
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[1].similarity_score, 0.5);
    }

    #[test]
    fn ties_break_by_lower_chunk_index() {
        let index = VectorIndex::build(vec![
            ("left", vec![-1.0]),
            ("right", vec![1.0]),
            ("center", vec![5.0]),
        ])
        .unwrap();
        let results = index.search(&[0.0], 2).unwrap();
        assert_eq!(results[0].chunk_text, "left");
        assert_eq!(results[1].chunk_text, "right");
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
    }

    #[test]
    fn k_larger_than_index_returns_every_chunk() {
        let index = sample();
        let results = index.search(&[0.0, 0.0], 50).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results.last().unwrap().chunk_text, "far");
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let err = sample().search(&[1.0, 2.0, 3.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn search_rejects_zero_k() {
        assert!(matches!(sample().search(&[0.0, 0.0], 0), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn build_rejects_non_finite_components() {
        let err = VectorIndex::build(vec![("a", vec![0.0, 1.0]), ("b", vec![f32::NAN, 1.0])])
            .unwrap_err();
        assert!(matches!(err, RagError::NonFiniteVector { ref vector } if vector == "chunk 1"));
        let err = VectorIndex::build(vec![("a", vec![f32::INFINITY])]).unwrap_err();
        assert!(matches!(err, RagError::NonFiniteVector { .. }));
    }

    #[test]
    fn search_rejects_non_finite_query() {
        let err = sample().search(&[f32::NAN, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::NonFiniteVector { ref vector } if vector == "query"));
        let err = sample().search(&[0.0, f32::NEG_INFINITY], 1).unwrap_err();
        assert!(matches!(err, RagError::NonFiniteVector { .. }));
    }

    #[test]
    fn huge_distances_saturate_and_keep_positive_scores() {
        let index = VectorIndex::build(vec![("far", vec![1e20]), ("farther", vec![3e20])]).unwrap();
        let results = index.search(&[-1e20], 2).unwrap();
        assert_eq!(results[0].chunk_text, "far");
        for result in &results {
            assert!(result.distance.is_finite());
            assert!(result.similarity_score > 0.0 && result.similarity_score <= 1.0);
        }
    }

    #[test]
    fn repeated_searches_are_identical() {
        let index = sample();
        assert_eq!(index.search(&[0.3, 0.7], 3).unwrap(), index.search(&[0.3, 0.7], 3).unwrap());
    }
}
