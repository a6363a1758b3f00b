//! PostgREST-style store for document and chunk records, plus the optional
//! `match_chunks` RPC that backs the server-side retrieval strategy.

use crate::models::{Candidate, Chunk, Document, DocumentStatus, EmbeddedChunkRow};
use crate::traits::{ChunkStore, DocumentStore, MatchIndex};
use crate::QueryError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

#[derive(Clone)]
pub struct RestStore {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

fn status_param(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Pending => "pending",
        DocumentStatus::Processing => "processing",
        DocumentStatus::Processed => "processed",
        DocumentStatus::Error => "error",
    }
}

impl RestStore {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, QueryError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    fn get(&self, path_and_query: &str) -> RequestBuilder {
        self.authorized(self.client.get(format!("{}/{path_and_query}", self.endpoint)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(format!("{}/{path}", self.endpoint)))
    }

    fn patch(&self, path_and_query: &str) -> RequestBuilder {
        self.authorized(
            self.client
                .patch(format!("{}/{path_and_query}", self.endpoint)),
        )
    }

    async fn row_count(&self, path_and_query: &str) -> Result<u64, QueryError> {
        let response = self.get(path_and_query).send().await?;
        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }
        let rows: Vec<Value> = response.json().await?;
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn insert_document(&self, document: &Document) -> Result<(), QueryError> {
        let response = self
            .post("documents")
            .header("Prefer", "return=minimal")
            .json(&json!([document]))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<Document>, QueryError> {
        let response = self.get("documents?select=*").send().await?;
        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(response.json().await?)
    }

    async fn count_documents(&self, status: Option<DocumentStatus>) -> Result<u64, QueryError> {
        let query = match status {
            Some(status) => format!("documents?select=id&status=eq.{}", status_param(status)),
            None => "documents?select=id".to_string(),
        };
        self.row_count(&query).await
    }

    async fn claim_for_processing(&self, document_id: Uuid) -> Result<bool, QueryError> {
        // The filter only matches a still-pending row, and the backend
        // applies the update atomically per row. A concurrent caller's PATCH
        // matches nothing and comes back with an empty representation.
        let response = self
            .patch(&format!("documents?id=eq.{document_id}&status=eq.pending"))
            .header("Prefer", "return=representation")
            .json(&json!({ "status": "processing" }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }

        let updated: Vec<Value> = response.json().await?;
        Ok(!updated.is_empty())
    }

    async fn set_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
    ) -> Result<(), QueryError> {
        let response = self
            .patch(&format!("documents?id=eq.{document_id}"))
            .json(&json!({ "status": status_param(status) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for RestStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<(), QueryError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let response = self
            .post("chunks")
            .header("Prefer", "return=minimal")
            .json(&chunks)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn count_chunks(&self, document_id: Option<Uuid>) -> Result<u64, QueryError> {
        let query = match document_id {
            Some(id) => format!("chunks?select=id&document_id=eq.{id}"),
            None => "chunks?select=id".to_string(),
        };
        self.row_count(&query).await
    }

    async fn count_embedded(&self) -> Result<u64, QueryError> {
        self.row_count("chunks?select=id&embedding=not.is.null")
            .await
    }

    async fn embedded_sample(&self, limit: usize) -> Result<Vec<EmbeddedChunkRow>, QueryError> {
        let response = self
            .get(&format!(
                "chunks?select=document_id,chunk_index,content,embedding\
                 &embedding=not.is.null&limit={limit}"
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "rest store".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MatchIndex for RestStore {
    async fn probe(&self) -> Result<bool, QueryError> {
        let response = self
            .post("rpc/match_chunks")
            .json(&json!({
                "query_embedding": Vec::<f32>::new(),
                "match_threshold": 0.0,
                "match_count": 0,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if status.is_server_error() {
            return Err(QueryError::BackendResponse {
                backend: "match function".to_string(),
                details: status.to_string(),
            });
        }
        // The function exists; argument validation errors still count as
        // capability.
        Ok(true)
    }

    async fn match_chunks(
        &self,
        query_vector: &[f32],
        threshold: f64,
        count: usize,
    ) -> Result<Vec<Candidate>, QueryError> {
        let response = self
            .post("rpc/match_chunks")
            .json(&json!({
                "query_embedding": query_vector,
                "match_threshold": threshold,
                "match_count": count,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "match function".to_string(),
                details: response.status().to_string(),
            });
        }

        let rows: Vec<Value> = response.json().await?;
        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(document_id) = row
                .pointer("/document_id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())
            else {
                // Malformed row; one bad record never aborts the search.
                continue;
            };

            let chunk_index = row
                .pointer("/chunk_index")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            let content = row
                .pointer("/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let similarity = row
                .pointer("/similarity")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            candidates.push(Candidate {
                document_id,
                chunk_index,
                content,
                similarity,
            });
        }

        Ok(candidates)
    }
}
