use crate::error::IngestError;
use crate::models::{Chunk, Document, DocumentStatus, SegmenterOptions};
use crate::segmenter::segment;
use crate::structural::is_structural;
use crate::traits::{ChunkStore, DocumentStore, Embedder};
use crate::QueryError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Recursively discovers plain-text documents for batch upload, sorted for
/// deterministic processing order.
pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Builds the document record for freshly uploaded bytes. The checksum makes
/// re-uploads of identical content detectable by the caller.
pub fn fingerprint_document(name: &str, bytes: &[u8]) -> Document {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let checksum = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v4();
    Document {
        id,
        name: name.to_string(),
        status: DocumentStatus::Pending,
        storage_path: format!("uploads/{id}/{name}"),
        checksum,
        uploaded_at: Utc::now(),
    }
}

pub fn document_name_from_path(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestionReport {
    pub claimed: bool,
    pub total_chunks: usize,
    pub structural_skipped: usize,
    pub embedded_chunks: usize,
    pub failed_embeddings: usize,
}

/// Turns raw document text into persisted, embedded chunks. Chunks are
/// written in segmentation order so `chunk_index` stays contiguous, and the
/// document record moves `pending` → `processing` → `processed` | `error`.
pub struct DocumentPipeline<D, C, E> {
    documents: D,
    chunks: C,
    embedder: E,
    options: SegmenterOptions,
}

impl<D, C, E> DocumentPipeline<D, C, E>
where
    D: DocumentStore + Sync,
    C: ChunkStore + Sync,
    E: Embedder + Sync,
{
    pub fn new(documents: D, chunks: C, embedder: E, options: SegmenterOptions) -> Self {
        Self {
            documents,
            chunks,
            embedder,
            options,
        }
    }

    pub async fn process(
        &self,
        document: &Document,
        raw_text: &str,
    ) -> Result<IngestionReport, IngestError> {
        let claimed = self.documents.claim_for_processing(document.id).await?;
        if !claimed {
            info!(document_id = %document.id, "document already claimed, skipping");
            return Ok(IngestionReport::default());
        }

        let mut report = IngestionReport {
            claimed: true,
            ..IngestionReport::default()
        };

        match self.run(document, raw_text, &mut report).await {
            Ok(()) => Ok(report),
            Err(error) => {
                // Best effort; the original failure is the one to surface.
                if let Err(status_error) = self
                    .documents
                    .set_status(document.id, DocumentStatus::Error)
                    .await
                {
                    warn!(
                        document_id = %document.id,
                        error = %status_error,
                        "failed to record error status"
                    );
                }
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        document: &Document,
        raw_text: &str,
        report: &mut IngestionReport,
    ) -> Result<(), IngestError> {
        let pieces = segment(raw_text, &self.options)?;

        let mut retained = Vec::with_capacity(pieces.len());
        for piece in pieces {
            if is_structural(&piece) {
                report.structural_skipped += 1;
            } else {
                retained.push(piece);
            }
        }

        let mut chunks = Vec::with_capacity(retained.len());
        for (index, content) in retained.into_iter().enumerate() {
            let embedding = match self.embedder.embed(&content).await {
                Ok(vector) => {
                    report.embedded_chunks += 1;
                    Some(vector)
                }
                Err(error @ QueryError::NotConfigured { .. }) => {
                    // A missing credential must surface, not degrade into a
                    // document with no vectors.
                    return Err(error.into());
                }
                Err(error) => {
                    warn!(
                        document_id = %document.id,
                        chunk_index = index,
                        error = %error,
                        "embedding failed, persisting chunk without vector"
                    );
                    report.failed_embeddings += 1;
                    None
                }
            };

            chunks.push(Chunk {
                id: Uuid::new_v4(),
                document_id: document.id,
                chunk_index: index as u32,
                content,
                embedding,
                created_at: Utc::now(),
            });
        }

        report.total_chunks = chunks.len();
        if chunks.is_empty() {
            info!(document_id = %document.id, "no retained chunks, marking document failed");
            self.documents
                .set_status(document.id, DocumentStatus::Error)
                .await?;
            return Ok(());
        }

        self.chunks.insert_chunks(&chunks).await?;
        self.documents
            .set_status(document.id, DocumentStatus::Processed)
            .await?;

        info!(
            document_id = %document.id,
            chunks = report.total_chunks,
            embedded = report.embedded_chunks,
            skipped_structural = report.structural_skipped,
            "document processed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmbeddedChunkRow;
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct FakeDocumentStore {
        claim_result: bool,
        statuses: Mutex<Vec<DocumentStatus>>,
    }

    impl FakeDocumentStore {
        fn accepting() -> Self {
            Self {
                claim_result: true,
                statuses: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FakeDocumentStore {
        async fn insert_document(&self, _document: &Document) -> Result<(), QueryError> {
            Ok(())
        }

        async fn list_documents(&self) -> Result<Vec<Document>, QueryError> {
            Ok(Vec::new())
        }

        async fn count_documents(
            &self,
            _status: Option<DocumentStatus>,
        ) -> Result<u64, QueryError> {
            Ok(0)
        }

        async fn claim_for_processing(&self, _document_id: Uuid) -> Result<bool, QueryError> {
            Ok(self.claim_result)
        }

        async fn set_status(
            &self,
            _document_id: Uuid,
            status: DocumentStatus,
        ) -> Result<(), QueryError> {
            self.statuses.lock().unwrap().push(status);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeChunkStore {
        inserted: Mutex<Vec<Chunk>>,
    }

    #[async_trait]
    impl ChunkStore for FakeChunkStore {
        async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<(), QueryError> {
            self.inserted.lock().unwrap().extend_from_slice(chunks);
            Ok(())
        }

        async fn count_chunks(&self, _document_id: Option<Uuid>) -> Result<u64, QueryError> {
            Ok(self.inserted.lock().unwrap().len() as u64)
        }

        async fn count_embedded(&self) -> Result<u64, QueryError> {
            Ok(0)
        }

        async fn embedded_sample(
            &self,
            _limit: usize,
        ) -> Result<Vec<EmbeddedChunkRow>, QueryError> {
            Ok(Vec::new())
        }
    }

    /// Shared-state store whose claim succeeds only for the caller that
    /// observes the `pending` status.
    #[derive(Clone)]
    struct ClaimOnceStore {
        status: Arc<Mutex<DocumentStatus>>,
    }

    #[async_trait]
    impl DocumentStore for ClaimOnceStore {
        async fn insert_document(&self, _document: &Document) -> Result<(), QueryError> {
            Ok(())
        }

        async fn list_documents(&self) -> Result<Vec<Document>, QueryError> {
            Ok(Vec::new())
        }

        async fn count_documents(
            &self,
            _status: Option<DocumentStatus>,
        ) -> Result<u64, QueryError> {
            Ok(0)
        }

        async fn claim_for_processing(&self, _document_id: Uuid) -> Result<bool, QueryError> {
            let mut status = self.status.lock().unwrap();
            if *status == DocumentStatus::Pending {
                *status = DocumentStatus::Processing;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn set_status(
            &self,
            _document_id: Uuid,
            status: DocumentStatus,
        ) -> Result<(), QueryError> {
            *self.status.lock().unwrap() = status;
            Ok(())
        }
    }

    /// Embeds everything except texts containing the poison marker.
    struct FakeEmbedder {
        not_configured: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError> {
            if self.not_configured {
                return Err(QueryError::not_configured(
                    "embedding service",
                    "set OPENAI_API_KEY",
                ));
            }
            if text.contains("poison") {
                return Err(QueryError::Request("transient failure".to_string()));
            }
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    fn pipeline_options() -> SegmenterOptions {
        SegmenterOptions {
            chunk_size: 120,
            overlap: 20,
        }
    }

    fn sample_document() -> Document {
        fingerprint_document("handbook.txt", b"irrelevant for these tests")
    }

    #[tokio::test]
    async fn processed_document_has_contiguous_chunk_indexes() {
        let pipeline = DocumentPipeline::new(
            FakeDocumentStore::accepting(),
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );

        let text = "La política de vacaciones concede veintidós días hábiles cada año.\n\n\
                    Las solicitudes se presentan mediante el portal interno de la empresa.\n\n\
                    El área de personas aprueba las solicitudes en un máximo de tres días.";
        let document = sample_document();
        let report = pipeline.process(&document, text).await.unwrap();

        assert!(report.claimed);
        assert!(report.total_chunks >= 2);
        assert_eq!(report.embedded_chunks, report.total_chunks);

        let inserted = pipeline.chunks.inserted.lock().unwrap();
        let indexes: Vec<u32> = inserted.iter().map(|chunk| chunk.chunk_index).collect();
        let expected: Vec<u32> = (0..inserted.len() as u32).collect();
        assert_eq!(indexes, expected);

        let statuses = pipeline.documents.statuses.lock().unwrap();
        assert_eq!(statuses.as_slice(), &[DocumentStatus::Processed]);
    }

    #[tokio::test]
    async fn structural_chunks_are_not_embedded_or_persisted() {
        let pipeline = DocumentPipeline::new(
            FakeDocumentStore::accepting(),
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );

        let toc = (1..=10)
            .map(|n| format!("{n}. Capítulo .......... {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!(
            "{toc}\n\n\
             El proceso de incorporación comienza con la firma del contrato laboral."
        );
        let document = sample_document();
        let report = pipeline.process(&document, &text).await.unwrap();

        assert!(report.structural_skipped >= 1);
        let inserted = pipeline.chunks.inserted.lock().unwrap();
        assert!(inserted
            .iter()
            .all(|chunk| !chunk.content.contains("..........")));
    }

    #[tokio::test]
    async fn rejected_claim_skips_all_work() {
        let pipeline = DocumentPipeline::new(
            FakeDocumentStore {
                claim_result: false,
                statuses: Mutex::new(Vec::new()),
            },
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );

        let document = sample_document();
        let report = pipeline
            .process(&document, "Texto cualquiera del documento.")
            .await
            .unwrap();

        assert!(!report.claimed);
        assert_eq!(report.total_chunks, 0);
        assert!(pipeline.chunks.inserted.lock().unwrap().is_empty());
        assert!(pipeline.documents.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn per_chunk_embedding_failure_keeps_the_rest() {
        let pipeline = DocumentPipeline::new(
            FakeDocumentStore::accepting(),
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );

        let text = "Primer párrafo con contenido razonable sobre el proceso de compras.\n\n\
                    Este párrafo contiene poison y su incrustación fallará sin remedio.\n\n\
                    Tercer párrafo con el procedimiento de aprobación de facturas.";
        let document = sample_document();
        let report = pipeline.process(&document, text).await.unwrap();

        assert_eq!(report.failed_embeddings, 1);
        assert_eq!(report.embedded_chunks, report.total_chunks - 1);

        let inserted = pipeline.chunks.inserted.lock().unwrap();
        assert_eq!(inserted.len(), report.total_chunks);
        assert_eq!(
            inserted
                .iter()
                .filter(|chunk| chunk.embedding.is_none())
                .count(),
            1
        );

        let statuses = pipeline.documents.statuses.lock().unwrap();
        assert_eq!(statuses.as_slice(), &[DocumentStatus::Processed]);
    }

    #[tokio::test]
    async fn missing_credentials_fail_the_document() {
        let pipeline = DocumentPipeline::new(
            FakeDocumentStore::accepting(),
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: true,
            },
            pipeline_options(),
        );

        let document = sample_document();
        let result = pipeline
            .process(&document, "Un párrafo perfectamente válido del manual interno.")
            .await;

        assert!(matches!(
            result,
            Err(IngestError::Collaborator(QueryError::NotConfigured { .. }))
        ));
        let statuses = pipeline.documents.statuses.lock().unwrap();
        assert_eq!(statuses.as_slice(), &[DocumentStatus::Error]);
    }

    #[tokio::test]
    async fn empty_document_is_marked_failed() {
        let pipeline = DocumentPipeline::new(
            FakeDocumentStore::accepting(),
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );

        let document = sample_document();
        let report = pipeline.process(&document, "   \n\n  ").await.unwrap();

        assert_eq!(report.total_chunks, 0);
        let statuses = pipeline.documents.statuses.lock().unwrap();
        assert_eq!(statuses.as_slice(), &[DocumentStatus::Error]);
    }

    #[tokio::test]
    async fn a_claimed_document_cannot_be_claimed_again() {
        let store = ClaimOnceStore {
            status: Arc::new(Mutex::new(DocumentStatus::Pending)),
        };
        let first = DocumentPipeline::new(
            store.clone(),
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );
        let second = DocumentPipeline::new(
            store,
            FakeChunkStore::default(),
            FakeEmbedder {
                not_configured: false,
            },
            pipeline_options(),
        );

        let document = sample_document();
        let text = "El procedimiento de compras exige tres presupuestos por pedido.";

        let first_report = first.process(&document, text).await.unwrap();
        let second_report = second.process(&document, text).await.unwrap();

        assert!(first_report.claimed);
        assert!(first_report.total_chunks >= 1);
        assert!(!second_report.claimed);
        assert_eq!(second_report.total_chunks, 0);
        assert!(second.chunks.inserted.lock().unwrap().is_empty());
    }

    #[test]
    fn fingerprint_checksum_is_reproducible() {
        let first = fingerprint_document("a.txt", b"abc");
        let second = fingerprint_document("a.txt", b"abc");
        assert_eq!(first.checksum, second.checksum);
        assert_ne!(first.id, second.id);
        assert_eq!(first.status, DocumentStatus::Pending);
    }

    #[test]
    fn discover_text_files_is_recursive_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("b.txt")).and_then(|mut file| file.write_all(b"beta"))?;
        File::create(nested.join("a.md")).and_then(|mut file| file.write_all(b"alpha"))?;
        File::create(base.join("ignored.pdf")).and_then(|mut file| file.write_all(b"skip"))?;

        let files = discover_text_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }
}
