use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an uploaded document: `pending` until one pipeline claims
/// it, then `processing` → `processed` | `error`. Only `Processed` documents
/// with at least one embedded chunk participate in retrieval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Processed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub status: DocumentStatus,
    pub storage_path: String,
    pub checksum: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// A chunk row fetched for brute-force search. The embedding arrives as raw
/// JSON because stores encode vectors either as numeric arrays or as
/// serialized strings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedChunkRow {
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub content: String,
    pub embedding: serde_json::Value,
}

/// Query-scoped retrieval candidate. Never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub document_id: Uuid,
    pub chunk_index: u32,
    pub content: String,
    pub similarity: f64,
}

/// One document's candidates during aggregation.
#[derive(Debug, Clone)]
pub struct ChunkGroup {
    pub document_id: Uuid,
    pub max_similarity: f64,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub document_name: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Session-scoped conversation state. Lives only on the client side of the
/// boundary; the core never persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    pub citations: Vec<Citation>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            citations: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            citations,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmenterOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            overlap: 200,
        }
    }
}

/// Retrieval tuning. Thresholds varied across iterations of the system this
/// replaces, so none of these defaults is authoritative; callers override
/// them from configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub min_similarity: f64,
    pub high_similarity: f64,
    pub max_documents: usize,
    pub top_k: usize,
    pub fetch_limit: usize,
    pub excerpt_chars: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            min_similarity: 0.5,
            high_similarity: 0.6,
            max_documents: 2,
            top_k: 5,
            fetch_limit: 200,
            excerpt_chars: 150,
        }
    }
}
