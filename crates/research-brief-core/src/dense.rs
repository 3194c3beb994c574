//! Embedding trait and flat inner-product index.
//!
//! Defines the [`Embedder`] trait every embedding backend implements, and a
//! [`DenseIndex`] that embeds each chunk once at build time and ranks chunks
//! by inner product with the query vector.
//!
//! The index L2-normalizes every vector it stores and every query it
//! receives, so inner product equals cosine similarity no matter how the
//! backend scales its output. Concrete backends (hashing, OpenAI, Ollama,
//! local models) live in the `research-brief` app crate.

use anyhow::{bail, Result};
use std::cmp::Ordering;

/// Trait for embedding backends.
///
/// Called once per chunk at index time and once per query at search time;
/// both calls must use the same model.
pub trait Embedder: Send + Sync {
    /// Model identifier recorded in traces (e.g. `"hash-384"`).
    fn name(&self) -> &str;
    /// Output dimensionality.
    fn dims(&self) -> usize;
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts. Backends with batch endpoints override this.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Inner product of two equal-length vectors; `0.0` on length mismatch.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Flat (exhaustive) inner-product index over normalized chunk vectors.
#[derive(Debug, Clone, Default)]
pub struct DenseIndex {
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl DenseIndex {
    /// Embed every text with `embedder` and store the normalized vectors.
    ///
    /// Fails if the backend returns the wrong number of vectors or vectors
    /// of inconsistent length.
    pub fn build(embedder: &dyn Embedder, texts: &[String]) -> Result<Self> {
        if texts.is_empty() {
            return Ok(Self::default());
        }

        let mut vectors = embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            bail!(
                "embedder '{}' returned {} vectors for {} texts",
                embedder.name(),
                vectors.len(),
                texts.len()
            );
        }

        let dims = vectors[0].len();
        for v in vectors.iter_mut() {
            if v.len() != dims {
                bail!(
                    "embedder '{}' returned inconsistent dimensions ({} vs {})",
                    embedder.name(),
                    v.len(),
                    dims
                );
            }
            l2_normalize(v);
        }

        Ok(Self { vectors, dims })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Top `k` chunk positions by inner product with `query_vec`.
    ///
    /// The query is normalized first. Ties go to the lowest chunk position,
    /// so results are deterministic for a fixed index.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query_vec.len() != self.dims {
            bail!(
                "query vector has {} dimensions, index has {}",
                query_vec.len(),
                self.dims
            );
        }

        let mut q = query_vec.to_vec();
        l2_normalize(&mut q);

        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embeds text as letter counts over a 4-letter alphabet.
    struct LetterEmbedder;

    impl Embedder for LetterEmbedder {
        fn name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            4
        }
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 4];
            for c in text.chars() {
                match c {
                    'a' => v[0] += 1.0,
                    'b' => v[1] += 1.0,
                    'c' => v[2] += 1.0,
                    'd' => v[3] += 1.0,
                    _ => {}
                }
            }
            Ok(v)
        }
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_nearest_first() {
        let idx = DenseIndex::build(&LetterEmbedder, &texts(&["aaaa", "bbbb", "cccc"])).unwrap();
        let q = LetterEmbedder.embed("bb").unwrap();
        let hits = idx.search(&q, 3).unwrap();
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_magnitude_does_not_matter() {
        let idx = DenseIndex::build(&LetterEmbedder, &texts(&["ab", "aaaaaaab"])).unwrap();
        let q = LetterEmbedder.embed("aaaaaaaaaaaaaaab").unwrap();
        let hits = idx.search(&q, 2).unwrap();
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn test_ties_go_to_lowest_position() {
        let idx =
            DenseIndex::build(&LetterEmbedder, &texts(&["cc", "dd", "cc", "zz"])).unwrap();
        let q = LetterEmbedder.embed("c").unwrap();
        let order: Vec<usize> = idx.search(&q, 4).unwrap().iter().map(|h| h.0).collect();
        assert_eq!(order, vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_k_larger_than_index() {
        let idx = DenseIndex::build(&LetterEmbedder, &texts(&["a", "b"])).unwrap();
        assert_eq!(idx.search(&[1.0, 0.0, 0.0, 0.0], 30).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_index() {
        let idx = DenseIndex::build(&LetterEmbedder, &[]).unwrap();
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_errors() {
        let idx = DenseIndex::build(&LetterEmbedder, &texts(&["a"])).unwrap();
        assert!(idx.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_wrong_vector_count_errors() {
        assert!(DenseIndex::build(&ShortEmbedder, &texts(&["a", "b"])).is_err());
    }
}
