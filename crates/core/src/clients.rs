//! HTTP clients for the embedding and chat-completion collaborators. Both
//! speak the OpenAI-compatible wire format. A client constructed without an
//! API key is disabled: every call short-circuits into an explicit
//! `NotConfigured` error instead of a silent empty result.

use crate::models::{ConversationTurn, Role};
use crate::traits::{ChatModel, Embedder};
use crate::QueryError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AiEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl AiEndpointConfig {
    fn api_key_or_disabled(&self, service: &str) -> Result<&str, QueryError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                QueryError::not_configured(
                    service.to_string(),
                    "set the AI service API key (for example OPENAI_API_KEY) and restart",
                )
            })
    }
}

pub struct HttpEmbedder {
    config: AiEndpointConfig,
    model: String,
    dimensions: usize,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(config: AiEndpointConfig, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            config,
            model: model.into(),
            dimensions,
            client: Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, QueryError> {
        let key = self.config.api_key_or_disabled("embedding service")?;

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.endpoint))
            .bearer_auth(key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| QueryError::BackendResponse {
                backend: "embeddings".to_string(),
                details: "response carried no embedding rows".to_string(),
            })
    }
}

pub struct HttpChatModel {
    config: AiEndpointConfig,
    model: String,
    client: Client,
}

impl HttpChatModel {
    pub fn new(config: AiEndpointConfig, model: impl Into<String>) -> Self {
        Self {
            config,
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> Result<String, QueryError> {
        let key = self.config.api_key_or_disabled("chat completion service")?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        for turn in history {
            messages.push(ChatMessage {
                role: wire_role(turn.role).to_string(),
                content: turn.text.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_message.to_string(),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature: 0.2,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QueryError::BackendResponse {
                backend: "chat completions".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| QueryError::BackendResponse {
                backend: "chat completions".to_string(),
                details: "response carried no choices".to_string(),
            })
    }
}
