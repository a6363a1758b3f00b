use crate::models::Candidate;
use crate::similarity::{cosine_similarity, decode_embedding};
use crate::traits::{ChunkStore, MatchIndex, SimilaritySearch};
use crate::QueryError;
use async_trait::async_trait;
use tracing::debug;

/// Delegates retrieval to the server-side nearest-neighbor function. Rows
/// arrive already scored and ordered.
pub struct MatchFunctionSearch<M> {
    index: M,
    threshold: f64,
}

impl<M> MatchFunctionSearch<M> {
    pub fn new(index: M, threshold: f64) -> Self {
        Self { index, threshold }
    }
}

#[async_trait]
impl<M> SimilaritySearch for MatchFunctionSearch<M>
where
    M: MatchIndex + Send + Sync,
{
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, QueryError> {
        self.index
            .match_chunks(query_vector, self.threshold, top_k)
            .await
    }
}

/// Client-side brute force over a bounded sample of embedded chunks, for
/// deployments without a server-side vector index. Returns up to `2 × top_k`
/// unfiltered candidates; thresholding is the aggregator's policy.
pub struct BruteForceSearch<S> {
    store: S,
    fetch_limit: usize,
}

impl<S> BruteForceSearch<S> {
    pub fn new(store: S, fetch_limit: usize) -> Self {
        Self { store, fetch_limit }
    }
}

#[async_trait]
impl<S> SimilaritySearch for BruteForceSearch<S>
where
    S: ChunkStore + Send + Sync,
{
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, QueryError> {
        let rows = self.store.embedded_sample(self.fetch_limit).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let mut skipped = 0usize;
        for row in rows {
            let Some(embedding) = decode_embedding(&row.embedding) else {
                skipped += 1;
                continue;
            };
            if embedding.len() != query_vector.len() {
                skipped += 1;
                continue;
            }

            candidates.push(Candidate {
                document_id: row.document_id,
                chunk_index: row.chunk_index,
                content: row.content,
                similarity: cosine_similarity(query_vector, &embedding),
            });
        }

        if skipped > 0 {
            debug!(skipped, "dropped malformed or mismatched embeddings");
        }

        candidates.sort_by(|left, right| right.similarity.total_cmp(&left.similarity));
        candidates.truncate(top_k.saturating_mul(2));
        Ok(candidates)
    }
}

/// One-time strategy selection. Probes the server function once at startup
/// and fixes the strategy for the lifetime of the engine; there is no
/// per-call fallback.
pub async fn choose_strategy<M, S>(
    index: M,
    store: S,
    match_threshold: f64,
    fetch_limit: usize,
) -> Result<Box<dyn SimilaritySearch + Send + Sync>, QueryError>
where
    M: MatchIndex + Send + Sync + 'static,
    S: ChunkStore + Send + Sync + 'static,
{
    if index.probe().await? {
        debug!("server-side match function available");
        Ok(Box::new(MatchFunctionSearch::new(index, match_threshold)))
    } else {
        debug!("falling back to client-side brute-force search");
        Ok(Box::new(BruteForceSearch::new(store, fetch_limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, EmbeddedChunkRow};
    use serde_json::json;
    use uuid::Uuid;

    struct FakeChunkStore {
        rows: Vec<EmbeddedChunkRow>,
    }

    #[async_trait]
    impl ChunkStore for FakeChunkStore {
        async fn insert_chunks(&self, _chunks: &[Chunk]) -> Result<(), QueryError> {
            Ok(())
        }

        async fn count_chunks(&self, _document_id: Option<Uuid>) -> Result<u64, QueryError> {
            Ok(self.rows.len() as u64)
        }

        async fn count_embedded(&self) -> Result<u64, QueryError> {
            Ok(self.rows.len() as u64)
        }

        async fn embedded_sample(
            &self,
            limit: usize,
        ) -> Result<Vec<EmbeddedChunkRow>, QueryError> {
            Ok(self.rows.iter().take(limit).cloned().collect())
        }
    }

    struct FakeMatchIndex {
        available: bool,
    }

    #[async_trait]
    impl MatchIndex for FakeMatchIndex {
        async fn probe(&self) -> Result<bool, QueryError> {
            Ok(self.available)
        }

        async fn match_chunks(
            &self,
            _query_vector: &[f32],
            _threshold: f64,
            _count: usize,
        ) -> Result<Vec<Candidate>, QueryError> {
            Ok(vec![Candidate {
                document_id: Uuid::nil(),
                chunk_index: 0,
                content: "served".to_string(),
                similarity: 0.9,
            }])
        }
    }

    fn row(document_id: Uuid, chunk_index: u32, embedding: serde_json::Value) -> EmbeddedChunkRow {
        EmbeddedChunkRow {
            document_id,
            chunk_index,
            content: format!("chunk {chunk_index}"),
            embedding,
        }
    }

    #[tokio::test]
    async fn brute_force_ranks_by_descending_similarity() {
        let doc = Uuid::new_v4();
        let store = FakeChunkStore {
            rows: vec![
                row(doc, 0, json!([0.0, 1.0])),
                row(doc, 1, json!([1.0, 0.0])),
                row(doc, 2, json!([0.7, 0.7])),
            ],
        };

        let search = BruteForceSearch::new(store, 200);
        let candidates = search.search(&[1.0, 0.0], 5).await.unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].chunk_index, 1);
        assert_eq!(candidates[1].chunk_index, 2);
        assert!(candidates[0].similarity >= candidates[1].similarity);
    }

    #[tokio::test]
    async fn brute_force_skips_bad_rows_and_accepts_string_encoding() {
        let doc = Uuid::new_v4();
        let store = FakeChunkStore {
            rows: vec![
                row(doc, 0, json!("[1.0,0.0]")),
                row(doc, 1, json!([1.0, 0.0, 0.0])),
                row(doc, 2, json!("broken")),
            ],
        };

        let search = BruteForceSearch::new(store, 200);
        let candidates = search.search(&[1.0, 0.0], 5).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].chunk_index, 0);
        assert!((candidates[0].similarity - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn brute_force_returns_at_most_twice_top_k() {
        let doc = Uuid::new_v4();
        let rows = (0..10).map(|i| row(doc, i, json!([1.0, 0.0]))).collect();
        let search = BruteForceSearch::new(FakeChunkStore { rows }, 200);

        let candidates = search.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(candidates.len(), 6);
    }

    #[tokio::test]
    async fn empty_store_is_a_valid_outcome() {
        let search = BruteForceSearch::new(FakeChunkStore { rows: Vec::new() }, 200);
        let candidates = search.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn probe_selects_the_server_strategy() {
        let strategy = choose_strategy(
            FakeMatchIndex { available: true },
            FakeChunkStore { rows: Vec::new() },
            0.3,
            200,
        )
        .await
        .unwrap();

        let candidates = strategy.search(&[1.0], 5).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "served");
    }

    #[tokio::test]
    async fn failed_probe_selects_brute_force() {
        let doc = Uuid::new_v4();
        let strategy = choose_strategy(
            FakeMatchIndex { available: false },
            FakeChunkStore {
                rows: vec![row(doc, 0, json!([1.0, 0.0]))],
            },
            0.3,
            200,
        )
        .await
        .unwrap();

        let candidates = strategy.search(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content, "chunk 0");
    }
}
