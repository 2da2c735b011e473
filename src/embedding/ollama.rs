//! HTTP client for an Ollama-compatible embedding service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingProvider;

/// Embed calls can block on model load, so they get a generous timeout;
/// health checks must fail fast.
const EMBED_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaClient {
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::blocking::Client,
    health_client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    /// `host` is `host:port`; the `http://` scheme is added here.
    pub fn new(host: &str, model: &str, dimension: usize) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .context("failed to build embedding HTTP client")?;
        let health_client = reqwest::blocking::Client::builder()
            .timeout(HEALTH_TIMEOUT)
            .build()
            .context("failed to build health-check HTTP client")?;

        Ok(Self {
            base_url: format!("http://{host}"),
            model: model.to_string(),
            dimension,
            client,
            health_client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Names of the models the service currently has available.
    pub fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .health_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .with_context(|| format!("tags request to {} failed", self.base_url))?;

        anyhow::ensure!(
            response.status().is_success(),
            "tags returned status {}",
            response.status()
        );

        let tags: TagsResponse = response.json().context("failed to decode tags response")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

impl EmbeddingProvider for OllamaClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .with_context(|| format!("embed request to {} failed", self.base_url))?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "embed returned status {status}");

        let body: EmbedResponse = response
            .json()
            .context("failed to decode embed response")?;

        // The first row is the embedding of our single input; extra rows
        // are ignored.
        let embedding = body
            .embeddings
            .into_iter()
            .next()
            .context("no embeddings in response")?;

        Ok(embedding.into_iter().map(|v| v as f32).collect())
    }

    fn healthy(&self) -> bool {
        match self
            .health_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "health check failed");
                false
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::validate_dimension;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, dimension: usize) -> OllamaClient {
        OllamaClient::new(&server.address().to_string(), "test-embed", dimension).unwrap()
    }

    #[test]
    fn embed_takes_first_row_as_f32() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/embed")
                .json_body_partial(r#"{"model": "test-embed", "input": "hello"}"#);
            then.status(200)
                .json_body(serde_json::json!({"embeddings": [[0.5, -1.25], [9.0, 9.0]]}));
        });

        let client = client_for(&server, 2);
        let embedding = client.embed("hello").unwrap();
        mock.assert();
        assert_eq!(embedding, vec![0.5f32, -1.25f32]);
    }

    #[test]
    fn embed_non_200_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(500);
        });

        let client = client_for(&server, 2);
        let err = client.embed("hello").unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn embed_empty_payload_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(200).json_body(serde_json::json!({"embeddings": []}));
        });

        let client = client_for(&server, 2);
        let err = client.embed("hello").unwrap_err();
        assert!(err.to_string().contains("no embeddings"));
    }

    #[test]
    fn healthy_reflects_tags_endpoint() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(serde_json::json!({"models": []}));
        });

        let client = client_for(&server, 2);
        assert!(client.healthy());

        let unreachable = OllamaClient::new("127.0.0.1:1", "test-embed", 2).unwrap();
        assert!(!unreachable.healthy());
    }

    #[test]
    fn list_models_returns_names() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(serde_json::json!({
                "models": [{"name": "qwen3-embedding:0.6b"}, {"name": "llama3:8b"}]
            }));
        });

        let client = client_for(&server, 2);
        let models = client.list_models().unwrap();
        assert_eq!(models, vec!["qwen3-embedding:0.6b", "llama3:8b"]);
    }

    #[test]
    fn validate_dimension_names_both_numbers() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/embed");
            then.status(200)
                .json_body(serde_json::json!({"embeddings": [[0.1, 0.2, 0.3]]}));
        });

        // Service produces 3 dims, store expects 4
        let client = client_for(&server, 4);
        let err = validate_dimension(&client).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("produces 3 dimensions"), "got: {msg}");
        assert!(msg.contains("expects 4"), "got: {msg}");
        assert!(msg.contains("EMBED_DIM=3"), "got: {msg}");

        // Matching dimension passes
        let client = client_for(&server, 3);
        validate_dimension(&client).unwrap();
    }
}
