use crate::models::{
    Candidate, Chunk, ConversationTurn, Document, DocumentStatus, EmbeddedChunkRow,
};
use crate::QueryError;
use async_trait::async_trait;
use uuid::Uuid;

/// External embedding service. Must be deterministic for identical input
/// within a single model version.
#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError>;
}

/// External chat completion service. The core builds the prompt and consumes
/// the text; it does not interpret the model's internals.
#[async_trait]
pub trait ChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String, QueryError>;
}

#[async_trait]
pub trait DocumentStore {
    async fn insert_document(&self, document: &Document) -> Result<(), QueryError>;

    async fn list_documents(&self) -> Result<Vec<Document>, QueryError>;

    async fn count_documents(&self, status: Option<DocumentStatus>) -> Result<u64, QueryError>;

    /// Conditional transition `pending` → `processing`. Exactly one of any
    /// set of concurrent callers observes true; everyone else must leave the
    /// document alone.
    async fn claim_for_processing(&self, document_id: Uuid) -> Result<bool, QueryError>;

    async fn set_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<(), QueryError>;
}

#[async_trait]
pub trait ChunkStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<(), QueryError>;

    async fn count_chunks(&self, document_id: Option<Uuid>) -> Result<u64, QueryError>;

    async fn count_embedded(&self) -> Result<u64, QueryError>;

    /// Bounded sample of chunks that carry embeddings, for the brute-force
    /// strategy.
    async fn embedded_sample(&self, limit: usize) -> Result<Vec<EmbeddedChunkRow>, QueryError>;
}

/// Server-side nearest-neighbor function, when the backing index exists.
#[async_trait]
pub trait MatchIndex {
    /// One-time capability check performed at startup, never per call.
    async fn probe(&self) -> Result<bool, QueryError>;

    async fn match_chunks(
        &self,
        query_vector: &[f32],
        threshold: f64,
        count: usize,
    ) -> Result<Vec<Candidate>, QueryError>;
}

/// Strategy seam for vector retrieval. Implementations return candidates in
/// descending similarity order; an empty corpus yields an empty list, not an
/// error.
#[async_trait]
pub trait SimilaritySearch {
    async fn search(&self, query_vector: &[f32], top_k: usize)
        -> Result<Vec<Candidate>, QueryError>;
}
