//! Exact nearest-neighbour index over the chunks of one document.
//!
//! Documents are small (tens to low hundreds of chunks), so search is a full
//! scan: every stored vector is compared with the query and the closest `top_k`
//! by Euclidean distance are returned. On unit vectors that ordering is the same
//! as ranking by cosine similarity.

use crate::embeddings::{l2_normalize, Embedder};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

pub struct EmbeddingIndex {
    chunks: Vec<String>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
    embedder: Arc<dyn Embedder>,
}

impl fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("chunks", &self.chunks.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl EmbeddingIndex {
    /// Embeds and stores `chunks` in order.
    ///
    /// Returns `None` when there is nothing to index: no chunks at all, or the
    /// single empty chunk the chunker emits for text without words.
    pub fn build(chunks: Vec<String>, embedder: Arc<dyn Embedder>) -> Option<Self> {
        let unindexable = match chunks.as_slice() {
            [] => true,
            [only] => only.trim().is_empty(),
            _ => false,
        };
        if unindexable {
            return None;
        }

        let texts = chunks.iter().map(String::as_str).collect::<Vec<_>>();
        let mut vectors = embedder.embed_batch(&texts);
        for vector in &mut vectors {
            l2_normalize(vector);
        }

        let dimensions = embedder.dimensions();
        debug!(chunk_count = chunks.len(), dimensions, "built embedding index");

        Some(Self {
            chunks,
            vectors,
            dimensions,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Positions of the `top_k` stored vectors closest to `query_vector`, nearest first.
    ///
    /// Equal distances keep chunk order. A vector whose length does not match
    /// the index is compared over the shared prefix only.
    pub fn nearest(&self, query_vector: &[f32], top_k: usize) -> Vec<Neighbor> {
        let mut scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: euclidean_distance(vector, query_vector),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| {
            left.distance
                .total_cmp(&right.distance)
                .then(left.position.cmp(&right.position))
        });
        scored.truncate(top_k);
        scored
    }

    /// The chunks closest to `query`, best match first; at most `top_k` of them.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<&str> {
        let mut query_vector = self.embedder.embed(query);
        l2_normalize(&mut query_vector);

        self.nearest(&query_vector, top_k)
            .into_iter()
            .filter_map(|neighbor| self.chunks.get(neighbor.position))
            .map(String::as_str)
            .collect()
    }
}

fn euclidean_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk_words, ChunkingConfig};
    use crate::embeddings::HashedNgramEmbedder;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashedNgramEmbedder::default())
    }

    fn sample_chunks() -> Vec<String> {
        vec![
            "The hydraulic pump must be inspected every 500 operating hours.".to_string(),
            "Invoices are payable within thirty days of receipt.".to_string(),
            "Employees accrue two days of annual leave per month.".to_string(),
            "The cafeteria serves lunch between noon and two.".to_string(),
        ]
    }

    #[test]
    fn empty_or_blank_chunk_tables_are_unindexable() {
        assert!(EmbeddingIndex::build(Vec::new(), embedder()).is_none());
        assert!(EmbeddingIndex::build(vec![String::new()], embedder()).is_none());

        let chunks = chunk_words("", &ChunkingConfig::default());
        assert!(EmbeddingIndex::build(chunks, embedder()).is_none());
    }

    #[test]
    fn every_chunk_retrieves_itself_first() {
        let chunks = sample_chunks();
        let index = EmbeddingIndex::build(chunks.clone(), embedder()).expect("index should build");

        for chunk in &chunks {
            let hits = index.search(chunk, 3);
            assert_eq!(hits.first().copied(), Some(chunk.as_str()));
        }
    }

    #[test]
    fn query_ranks_matching_chunk_first() {
        let index = EmbeddingIndex::build(sample_chunks(), embedder()).expect("index should build");
        let hits = index.search("how often is the hydraulic pump inspected", 2);

        assert_eq!(hits.len(), 2);
        assert!(hits[0].contains("hydraulic pump"));
    }

    #[test]
    fn top_k_larger_than_index_returns_all_chunks() {
        let index = EmbeddingIndex::build(sample_chunks(), embedder()).expect("index should build");
        assert_eq!(index.search("leave", 15).len(), 4);
        assert!(index.search("leave", 0).is_empty());
    }

    #[test]
    fn rebuilding_gives_identical_rankings() {
        let first = EmbeddingIndex::build(sample_chunks(), embedder()).expect("index should build");
        let second =
            EmbeddingIndex::build(sample_chunks(), embedder()).expect("index should build");

        let query = "payment terms for invoices";
        assert_eq!(first.search(query, 4), second.search(query, 4));
    }

    #[test]
    fn ties_keep_chunk_order() {
        let chunks = vec!["same words".to_string(), "same words".to_string()];
        let index = EmbeddingIndex::build(chunks, embedder()).expect("index should build");

        let neighbors = index.nearest(&[0.0; 4], 2);
        assert_eq!(neighbors[0].position, 0);
        assert_eq!(neighbors[1].position, 1);
    }

    #[test]
    fn stored_vectors_are_unit_length() {
        let index = EmbeddingIndex::build(sample_chunks(), embedder()).expect("index should build");
        for vector in &index.vectors {
            let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert_eq!(index.dimensions(), 384);
    }
}
