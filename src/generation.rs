use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::error::RagError;

use crate::index::RetrievedChunk;

/// The external answer-composition collaborator: consumes a query and
/// an ordered list of context passages, returns a text answer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(
        &self,
        query: &str,
        context: &[RetrievedChunk],
    ) -> Result<String, RagError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

const SYSTEM_PROMPT: &str = "You answer questions using only the provided context passages. \
If the context does not contain the answer, say so instead of guessing.";

/// Chat-completion client for OpenAI-compatible endpoints. Generation
/// failures are surfaced as-is and never retried; the answer is
/// returned verbatim.
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(config: &RagConfig) -> Result<Self, RagError> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::Configuration(
                "API key must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            model = %config.generation_model,
            temperature = config.generation_temperature,
            "Generation client configured"
        );

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.api_base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            model: config.generation_model.clone(),
            temperature: config.generation_temperature,
        })
    }
}

/// Assembles the user prompt: numbered context passages in retrieval
/// order, then the question.
fn build_prompt(query: &str, context: &[RetrievedChunk]) -> String {
    let mut prompt = String::from("Context passages:\n\n");
    for (i, retrieved) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n\n", i + 1, retrieved.chunk.text));
    }
    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt
}

#[async_trait]
impl Generator for ChatClient {
    async fn complete(
        &self,
        query: &str,
        context: &[RetrievedChunk],
    ) -> Result<String, RagError> {
        let prompt = build_prompt(query, context);
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("chat request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "chat request failed ({status}): {body}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("failed to parse chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::Generation("service returned no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;

    fn retrieved(ordinal: usize, text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                ordinal,
                offset: 0,
                text: text.to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_prompt_numbers_passages_in_retrieval_order() {
        let context = vec![
            retrieved(4, "most relevant", 0.9),
            retrieved(0, "second best", 0.7),
        ];
        let prompt = build_prompt("what is relevant?", &context);

        let first = prompt.find("[1] most relevant").unwrap();
        let second = prompt.find("[2] second best").unwrap();
        assert!(first < second);
        assert!(prompt.ends_with("Question: what is relevant?"));
    }

    #[test]
    fn test_prompt_with_no_context_still_carries_question() {
        let prompt = build_prompt("anything?", &[]);
        assert!(prompt.contains("Question: anything?"));
    }

    #[test]
    fn test_empty_api_key_is_configuration_error() {
        let config = RagConfig::default();
        assert!(matches!(
            ChatClient::new(&config),
            Err(RagError::Configuration(_))
        ));
    }
}
