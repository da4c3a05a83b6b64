//! Ollama HTTP client.

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::observability::SpanTimer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "ollama";

/// Client for a local Ollama instance.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Creates a client for the instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Client` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, err: &reqwest::Error) -> LlmError {
        if err.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if err.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::Client(err.to_string())
        }
    }
}

/// Request body for `/api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from `/api/generate`.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Response body from `/api/tags`.
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            stream: false,
            options: request.temperature.map(|temperature| GenerateOptions { temperature }),
        };

        let timer = SpanTimer::start("ollama.generate");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotFound(request.model.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;
        let latency_ms = timer.finish();

        debug!(
            model = %request.model,
            latency_ms,
            output_tokens = ?parsed.eval_count,
            "Generation finished"
        );

        Ok(LlmResponse {
            content: parsed.response,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            provider: PROVIDER.to_string(),
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
            latency_ms,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                if key.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        buf.len() >= header_end + 4 + content_length
    }

    /// Serves a single canned HTTP response and returns the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}")
    }

    fn client(base_url: &str) -> OllamaClient {
        OllamaClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(client("http://localhost:11434/").base_url(), "http://localhost:11434");
        assert_eq!(client("http://localhost:11434").provider(), "ollama");
    }

    #[test]
    fn test_generate_body_shape() {
        let body = GenerateRequest {
            model: "mistral:latest",
            prompt: "hi",
            system: None,
            stream: false,
            options: Some(GenerateOptions { temperature: 0.5 }),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
        assert_eq!(json["options"]["temperature"], 0.5);
    }

    #[tokio::test]
    async fn test_generate_success() {
        let base = serve_once(
            "200 OK",
            r#"{"model":"mistral:latest","response":"Hello World","done":true,"prompt_eval_count":12,"eval_count":3}"#,
        )
        .await;

        let response = client(&base)
            .generate(&LlmRequest::new("mistral:latest", "Say 'Hello World' and nothing else."))
            .await
            .unwrap();

        assert_eq!(response.content, "Hello World");
        assert_eq!(response.provider, "ollama");
        assert_eq!(response.input_tokens, Some(12));
        assert_eq!(response.output_tokens, Some(3));
    }

    #[tokio::test]
    async fn test_generate_missing_model() {
        let base = serve_once("404 Not Found", r#"{"error":"model 'phi3' not found"}"#).await;

        let err = client(&base)
            .generate(&LlmRequest::new("phi3", "hi"))
            .await
            .unwrap_err();

        assert_eq!(err, LlmError::ModelNotFound("phi3".to_string()));
    }

    #[tokio::test]
    async fn test_generate_server_error() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"out of memory"}"#).await;

        let err = client(&base)
            .generate(&LlmRequest::new("mistral:latest", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Backend { status: 500, ref body } if body.contains("out of memory")));
    }

    #[tokio::test]
    async fn test_generate_bad_body() {
        let base = serve_once("200 OK", r#"{"unexpected":true}"#).await;

        let err = client(&base)
            .generate(&LlmRequest::new("mistral:latest", "hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ResponseParsing(_)));
    }

    #[tokio::test]
    async fn test_list_models() {
        let base = serve_once(
            "200 OK",
            r#"{"models":[{"name":"mistral:latest"},{"name":"llama3:8b"}]}"#,
        )
        .await;

        let models = client(&base).list_models().await.unwrap();
        assert_eq!(models, vec!["mistral:latest", "llama3:8b"]);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"))
            .list_models()
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Connection(_)));
        assert_eq!(err.cause(), crate::errors::FailureCause::Connection);
    }
}
