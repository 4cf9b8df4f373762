//! OpenAI-compatible API client
//!
//! `POST {base_url}/embeddings` for vectors and
//! `POST {base_url}/chat/completions` for completions.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OpenAIConfig;
use crate::core::{Completer, Embedder};
use crate::error::{Error, Result};

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAIProvider {
    /// HTTP client
    client: Client,
    /// Configuration
    config: OpenAIConfig,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

impl OpenAIProvider {
    /// Create a new client
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        // Add authorization header
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!(
                "Bearer {}",
                config.api_key.expose_secret()
            ))
            .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(OpenAIProvider { client, config })
    }

    /// POST a JSON body and decode the JSON reply
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| Error::provider(format!("Invalid response from {}: {}", path, e)));
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = format!("API error ({}): {}", status, error_text);
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            warn!("Transient provider failure: {}", message);
            Err(Error::provider_transient(message))
        } else {
            Err(Error::provider(message))
        }
    }
}

#[async_trait]
impl Embedder for OpenAIProvider {
    fn model(&self) -> &str {
        &self.config.embedding_model
    }

    fn dimensions(&self) -> Option<usize> {
        match self.config.embedding_model.as_str() {
            "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            _ => None,
        }
    }

    async fn generate_vector(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.config.embedding_model, chars = text.len(), "Generating vector");

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self.post("embeddings", &request).await?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::provider("No embedding in response"))?;

        if vector.is_empty() {
            return Err(Error::provider("Provider returned an empty vector"));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Completer for OpenAIProvider {
    fn model(&self) -> &str {
        &self.config.completion_model
    }

    async fn generate_completion(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.config.completion_model, "Generating completion");

        let request = ChatRequest {
            model: &self.config.completion_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;

        if let Some(usage) = &response.usage {
            debug!(tokens = usage.total_tokens, "Completion usage");
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::provider("No completion in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new(OpenAIConfig {
            api_key: SecretString::from("sk-test"),
            base_url: server.uri(),
            ..OpenAIConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "text-embedding-ada-002", "input": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}],
                "model": "text-embedding-ada-002"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = provider(&server).generate_vector("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_generate_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 1000,
                "messages": [{"role": "user", "content": "Say hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "hi"}}],
                "usage": {"total_tokens": 7}
            })))
            .mount(&server)
            .await;

        let text = provider(&server).generate_completion("Say hi").await.unwrap();
        assert_eq!(text, "hi");
    }

    #[tokio::test]
    async fn test_empty_choices_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider(&server).generate_completion("x").await.unwrap_err();
        assert!(matches!(err, Error::Provider { retryable: false, .. }));
    }

    #[tokio::test]
    async fn test_error_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"input": "limited"})))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"input": "unauthorized"})))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let err = provider.generate_vector("limited").await.unwrap_err();
        assert!(err.is_retryable());
        let err = provider.generate_vector("unauthorized").await.unwrap_err();
        assert!(matches!(err, Error::Provider { retryable: false, .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = provider(&server).generate_vector("x").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
