use crate::aggregator;
use crate::models::{Citation, ConversationTurn, DocumentStatus, RetrievalOptions};
use crate::router::{answer_reports_no_information, classify, pick_welcome, MetaTopic, QueryRoute};
use crate::traits::{ChatModel, ChunkStore, DocumentStore, Embedder, SimilaritySearch};
use crate::QueryError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const NO_DOCUMENTS_MESSAGE: &str = "Todavía no hay documentos cargados. Sube al menos un \
     documento para poder responder preguntas sobre su contenido.";

pub const STILL_PROCESSING_MESSAGE: &str = "Los documentos siguen procesándose. Inténtalo de \
     nuevo en unos minutos, cuando los fragmentos estén indexados.";

pub const NOTHING_RELEVANT_MESSAGE: &str = "No encontré fragmentos relevantes para esa pregunta \
     en los documentos cargados. Prueba a reformularla o sube documentación adicional.";

const SYSTEM_PROMPT: &str = "Eres un asistente que responde preguntas usando exclusivamente el \
     contexto proporcionado. Si el contexto no contiene la respuesta, di claramente que no \
     tienes información al respecto y no inventes nada.";

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub route: QueryRoute,
}

impl Answer {
    fn guidance(text: &str, route: QueryRoute) -> Self {
        Self {
            text: text.to_string(),
            citations: Vec::new(),
            route,
        }
    }
}

/// Answers questions strictly from the uploaded corpus. Collaborators are
/// injected so tests substitute fakes; the retrieval strategy is fixed at
/// construction time.
pub struct ChatEngine<D, C, E, L> {
    documents: D,
    chunks: C,
    embedder: E,
    chat: L,
    strategy: Box<dyn SimilaritySearch + Send + Sync>,
    options: RetrievalOptions,
    rng: Mutex<StdRng>,
}

impl<D, C, E, L> ChatEngine<D, C, E, L>
where
    D: DocumentStore + Send + Sync,
    C: ChunkStore + Send + Sync,
    E: Embedder + Send + Sync,
    L: ChatModel + Send + Sync,
{
    pub fn new(
        documents: D,
        chunks: C,
        embedder: E,
        chat: L,
        strategy: Box<dyn SimilaritySearch + Send + Sync>,
        options: RetrievalOptions,
    ) -> Self {
        Self::with_rng(
            documents,
            chunks,
            embedder,
            chat,
            strategy,
            options,
            StdRng::from_entropy(),
        )
    }

    /// Injects the random source for deterministic greeting tests.
    #[allow(clippy::too_many_arguments)]
    pub fn with_rng(
        documents: D,
        chunks: C,
        embedder: E,
        chat: L,
        strategy: Box<dyn SimilaritySearch + Send + Sync>,
        options: RetrievalOptions,
        rng: StdRng,
    ) -> Self {
        Self {
            documents,
            chunks,
            embedder,
            chat,
            strategy,
            options,
            rng: Mutex::new(rng),
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, QueryError> {
        match classify(question) {
            QueryRoute::Greeting => Ok(self.greet()),
            QueryRoute::SystemMeta(topic) => self.answer_meta(topic).await,
            QueryRoute::Content => self.answer_content(question, history).await,
        }
    }

    fn greet(&self) -> Answer {
        let text = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            pick_welcome(&mut *rng)
        };
        Answer::guidance(text, QueryRoute::Greeting)
    }

    /// Deterministic handlers that never touch the embedding pipeline.
    async fn answer_meta(&self, topic: MetaTopic) -> Result<Answer, QueryError> {
        let route = QueryRoute::SystemMeta(topic);
        let text = match topic {
            MetaTopic::DocumentCount => {
                let total = self.documents.count_documents(None).await?;
                let processed = self
                    .documents
                    .count_documents(Some(DocumentStatus::Processed))
                    .await?;
                format!(
                    "Hay {total} documentos cargados; {processed} ya están procesados y \
                     disponibles para consultas."
                )
            }
            MetaTopic::SupportedTypes => "Acepto documentos de texto plano (.txt y .md). El \
                 texto se divide en fragmentos y cada fragmento se indexa para la búsqueda \
                 semántica."
                .to_string(),
            MetaTopic::HowItWorks => "Busco los fragmentos de tus documentos más parecidos a la \
                 pregunta y redacto la respuesta usando únicamente esos fragmentos, citando las \
                 fuentes utilizadas."
                .to_string(),
            MetaTopic::AskableTopics => {
                let documents = self.documents.list_documents().await?;
                if documents.is_empty() {
                    return Ok(Answer::guidance(NO_DOCUMENTS_MESSAGE, route));
                }
                let names: Vec<String> =
                    documents.into_iter().map(|document| document.name).collect();
                format!(
                    "Puedes preguntar sobre el contenido de estos documentos: {}.",
                    names.join(", ")
                )
            }
        };
        Ok(Answer {
            text,
            citations: Vec::new(),
            route,
        })
    }

    async fn answer_content(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, QueryError> {
        let documents = self.documents.list_documents().await?;
        if documents.is_empty() {
            return Ok(Answer::guidance(NO_DOCUMENTS_MESSAGE, QueryRoute::Content));
        }

        let any_processed = documents
            .iter()
            .any(|document| document.status == DocumentStatus::Processed);
        let embedded = self.chunks.count_embedded().await?;
        if !any_processed || embedded == 0 {
            return Ok(Answer::guidance(
                STILL_PROCESSING_MESSAGE,
                QueryRoute::Content,
            ));
        }

        let query_vector = self.embedder.embed(question).await?;
        if query_vector.len() != self.embedder.dimensions() {
            return Err(QueryError::BackendResponse {
                backend: "embeddings".to_string(),
                details: format!(
                    "query vector has {} dimensions, embedder is configured for {}",
                    query_vector.len(),
                    self.embedder.dimensions()
                ),
            });
        }
        let candidates = self
            .strategy
            .search(&query_vector, self.options.top_k)
            .await?;
        debug!(candidates = candidates.len(), "similarity search finished");

        let names: HashMap<Uuid, String> = documents
            .into_iter()
            .map(|document| (document.id, document.name))
            .collect();
        let selection = aggregator::select(candidates, &names, &self.options);
        if selection.is_empty() {
            return Ok(Answer::guidance(
                NOTHING_RELEVANT_MESSAGE,
                QueryRoute::Content,
            ));
        }

        let system_prompt = format!(
            "{SYSTEM_PROMPT}\n\nContexto:\n{}",
            selection.context_block
        );
        let text = self.chat.complete(&system_prompt, history, question).await?;

        // A non-answer must not arrive dressed with sources.
        let citations = if answer_reports_no_information(&text) {
            Vec::new()
        } else {
            selection.citations
        };

        Ok(Answer {
            text,
            citations,
            route: QueryRoute::Content,
        })
    }
}
