//! Completion collaborator and its Ollama implementation

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Instant;
use tracing::{debug, info};

use crate::metrics::LLM_CALL_DURATION;

/// Error type for completion calls
#[derive(Debug)]
pub enum CompletionError {
    /// HTTP transport failed
    Request(reqwest::Error),
    /// A response line was not valid JSON
    Parse(serde_json::Error),
    /// The server reported an error
    Api(String),
    /// The model produced no text
    EmptyResponse,
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Request(e) => write!(f, "Request error: {}", e),
            CompletionError::Parse(e) => write!(f, "Parse error: {}", e),
            CompletionError::Api(msg) => write!(f, "Ollama error: {}", msg),
            CompletionError::EmptyResponse => write!(f, "Empty response from model"),
        }
    }
}

impl std::error::Error for CompletionError {}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Request(e)
    }
}

impl From<serde_json::Error> for CompletionError {
    fn from(e: serde_json::Error) -> Self {
        CompletionError::Parse(e)
    }
}

/// Turns a prompt into a reply in one round trip
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Response from Ollama's generate endpoint with metadata
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    /// The generated text
    pub response: String,
    /// Number of tokens generated
    pub eval_count: u32,
    /// Number of tokens in the prompt
    pub prompt_eval_count: u32,
    /// Time spent generating tokens (nanoseconds)
    pub eval_duration_ns: u64,
}

impl GenerateResponse {
    /// Fold one newline-delimited JSON chunk into the response
    fn absorb(&mut self, data: &serde_json::Value) -> Result<(), CompletionError> {
        if let Some(error) = data["error"].as_str() {
            return Err(CompletionError::Api(error.to_string()));
        }
        if let Some(token) = data["response"].as_str() {
            self.response.push_str(token);
        }
        if data["done"].as_bool() == Some(true) {
            self.eval_count = data["eval_count"].as_u64().unwrap_or(0) as u32;
            self.prompt_eval_count = data["prompt_eval_count"].as_u64().unwrap_or(0) as u32;
            self.eval_duration_ns = data["eval_duration"].as_u64().unwrap_or(0);
        }
        Ok(())
    }
}

/// Client for Ollama's HTTP API, bound to one model
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the Ollama server (e.g., "http://localhost:11434")
    /// * `model` - The model name (e.g., "qwen3")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a complete response, accumulating the streamed tokens
    pub async fn generate(&self, prompt: &str) -> Result<GenerateResponse, CompletionError> {
        let endpoint = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": true,
                "options": { "temperature": 0.0 }
            }))
            .send()
            .await?
            .error_for_status()?;

        let mut bytes_stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut result = GenerateResponse::default();

        // Chunks do not align with JSON lines, so buffer until a newline arrives
        while let Some(chunk) = bytes_stream.next().await {
            pending.extend_from_slice(&chunk?);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                absorb_line(&mut result, &line)?;
            }
        }
        absorb_line(&mut result, &pending)?;

        Ok(result)
    }
}

fn absorb_line(result: &mut GenerateResponse, line: &[u8]) -> Result<(), CompletionError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(());
    }
    let data: serde_json::Value = serde_json::from_slice(trimmed)?;
    result.absorb(&data)
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let start = Instant::now();
        let generated = self.generate(prompt).await?;
        let elapsed = start.elapsed().as_secs_f64();

        LLM_CALL_DURATION
            .with_label_values(&[&self.model])
            .observe(elapsed);
        info!(
            model = %self.model,
            duration_ms = elapsed * 1000.0,
            eval_count = generated.eval_count,
            "Completion finished"
        );
        debug!(reply_len = generated.response.len(), "Completion reply");

        if generated.response.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(generated.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_accumulates_tokens_and_metadata() {
        let mut result = GenerateResponse::default();
        absorb_line(&mut result, br#"{"response":"Hel","done":false}"#).unwrap();
        absorb_line(&mut result, b"  \n").unwrap();
        absorb_line(
            &mut result,
            br#"{"response":"lo","done":true,"eval_count":7,"prompt_eval_count":3,"eval_duration":99}"#,
        )
        .unwrap();

        assert_eq!(result.response, "Hello");
        assert_eq!(result.eval_count, 7);
        assert_eq!(result.prompt_eval_count, 3);
        assert_eq!(result.eval_duration_ns, 99);
    }

    #[test]
    fn test_absorb_surfaces_server_error() {
        let mut result = GenerateResponse::default();
        let err = absorb_line(&mut result, br#"{"error":"model not found"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Ollama error: model not found");
    }

    #[test]
    fn test_absorb_rejects_garbage() {
        let mut result = GenerateResponse::default();
        assert!(matches!(
            absorb_line(&mut result, b"not json"),
            Err(CompletionError::Parse(_))
        ));
    }

    #[tokio::test]
    #[ignore = "Requires Ollama running on localhost:11434"]
    async fn test_ollama_complete() {
        let client = OllamaClient::new("http://localhost:11434", "qwen3");
        let reply = client.complete("Say hi").await.unwrap();
        assert!(!reply.is_empty());
    }
}
