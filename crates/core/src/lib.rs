pub mod aggregator;
pub mod clients;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod router;
pub mod search;
pub mod segmenter;
pub mod similarity;
pub mod stores;
pub mod structural;
pub mod traits;

pub use aggregator::Selection;
pub use clients::{AiEndpointConfig, HttpChatModel, HttpEmbedder};
pub use engine::{
    Answer, ChatEngine, NOTHING_RELEVANT_MESSAGE, NO_DOCUMENTS_MESSAGE, STILL_PROCESSING_MESSAGE,
};
pub use error::{IngestError, QueryError};
pub use ingest::{
    discover_text_files, document_name_from_path, fingerprint_document, DocumentPipeline,
    IngestionReport,
};
pub use models::{
    Candidate, Chunk, ChunkGroup, Citation, ConversationTurn, Document, DocumentStatus,
    EmbeddedChunkRow, RetrievalOptions, Role, SegmenterOptions,
};
pub use router::{MetaTopic, QueryRoute};
pub use search::{choose_strategy, BruteForceSearch, MatchFunctionSearch};
pub use segmenter::segment;
pub use similarity::cosine_similarity;
pub use stores::RestStore;
pub use structural::is_structural;
pub use traits::{ChatModel, ChunkStore, DocumentStore, Embedder, MatchIndex, SimilaritySearch};
