//! Prompt templates and the Ollama generation client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DetailLevel;
use crate::config::{OllamaConfig, PromptConfig};
use crate::{Result, SummarizerError};

/// Placeholder substituted with the text to summarize
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Prompt text with a `{text}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, text: &str) -> String {
        self.0.replace(TEXT_PLACEHOLDER, text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The three prompts used by the pipeline
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub short: PromptTemplate,
    pub detailed: PromptTemplate,
    pub map: PromptTemplate,
}

impl PromptSet {
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            short: PromptTemplate::new(config.short.clone()),
            detailed: PromptTemplate::new(config.detailed.clone()),
            map: PromptTemplate::new(config.map.clone()),
        }
    }

    /// Template for direct and reduce calls
    pub fn for_detail(&self, detail: DetailLevel) -> &PromptTemplate {
        match detail {
            DetailLevel::Short => &self.short,
            DetailLevel::Detailed => &self.detailed,
        }
    }
}

/// A text generation service that turns a prompt into a summary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// Render `template` with `text` and return the generated, trimmed summary
    async fn generate(&self, text: &str, template: &PromptTemplate) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

/// Ollama `/api/generate` client, non-streaming
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                SummarizerError::Configuration(format!("Cannot build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SummaryBackend for OllamaBackend {
    async fn generate(&self, text: &str, template: &PromptTemplate) -> Result<String> {
        let prompt = template.render(text);
        let payload = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(
            "Sending {} prompt characters to {} (model {})",
            prompt.len(),
            self.endpoint,
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SummarizerError::Backend(format!(
                        "Request to Ollama at {} timed out: {}",
                        self.endpoint, e
                    ))
                } else {
                    SummarizerError::Backend(format!(
                        "Cannot reach Ollama at {}. Is the server running? {}",
                        self.endpoint, e
                    ))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SummarizerError::Backend(format!("Failed to read Ollama response: {}", e))
        })?;

        interpret_response(status, &body)
    }
}

/// Decode a generate response. An `error` field wins over the HTTP status.
fn interpret_response(status: StatusCode, body: &str) -> Result<String> {
    match serde_json::from_str::<GenerateResponse>(body) {
        Ok(GenerateResponse {
            error: Some(message),
            ..
        }) => Err(SummarizerError::Backend(format!(
            "Ollama returned an error: {}",
            message
        ))),
        Ok(GenerateResponse {
            response: Some(text),
            ..
        }) if status.is_success() => Ok(text.trim().to_string()),
        _ if !status.is_success() => Err(SummarizerError::Backend(format!(
            "Ollama request failed with HTTP {}: {}",
            status,
            excerpt(body)
        ))),
        Ok(_) => Err(SummarizerError::Backend(format!(
            "Invalid response from Ollama, missing 'response' field: {}",
            excerpt(body)
        ))),
        Err(e) => Err(SummarizerError::Backend(format!(
            "Invalid JSON response from Ollama ({}): {}",
            e,
            excerpt(body)
        ))),
    }
}

fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= LIMIT {
        trimmed.to_string()
    } else {
        format!("{}...", trimmed.chars().take(LIMIT).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer a single HTTP request with `status_line` and `body`; yields the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}", address), handle)
    }

    fn backend_for(base_url: String) -> OllamaBackend {
        OllamaBackend::new(&OllamaConfig {
            base_url,
            model: "mistral".to_string(),
            timeout_secs: 5,
            temperature: 0.5,
        })
        .unwrap()
    }

    #[test]
    fn test_prompt_template_render() {
        let template = PromptTemplate::new("Summarize:\n{text}\nDone.");
        assert_eq!(template.render("hello"), "Summarize:\nhello\nDone.");
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let backend = backend_for("http://localhost:11434/".to_string());
        assert_eq!(backend.endpoint(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_error_field_wins_over_status() {
        let err = interpret_response(StatusCode::NOT_FOUND, r#"{"error":"model not found"}"#)
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Backend(_)));
        assert!(err.to_string().contains("model not found"));

        let err = interpret_response(StatusCode::OK, r#"{"error":"out of memory"}"#).unwrap_err();
        assert!(err.to_string().contains("out of memory"));
    }

    #[test]
    fn test_response_is_trimmed() {
        let text = interpret_response(StatusCode::OK, r#"{"response":"  A summary.\n"}"#).unwrap();
        assert_eq!(text, "A summary.");
    }

    #[test]
    fn test_missing_response_field() {
        let err = interpret_response(StatusCode::OK, r#"{"done":true}"#).unwrap_err();
        assert!(err.to_string().contains("missing 'response'"));
    }

    #[test]
    fn test_non_json_body() {
        let err = interpret_response(StatusCode::OK, "<html>proxy</html>").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));

        let err =
            interpret_response(StatusCode::BAD_GATEWAY, "<html>proxy</html>").unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_generate_posts_rendered_prompt() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"model":"mistral","response":" Short summary. ","done":true}"#)
                .await;
        let backend = backend_for(base_url);

        let summary = backend
            .generate("Paris is the capital of France.", &PromptTemplate::new("TL;DR: {text}"))
            .await
            .unwrap();
        assert_eq!(summary, "Short summary.");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/generate"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["model"], "mistral");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.5);
        assert_eq!(json["prompt"], "TL;DR: Paris is the capital of France.");
    }

    #[tokio::test]
    async fn test_generate_surfaces_model_not_found() {
        let (base_url, _server) = serve_once("404 Not Found", r#"{"error":"model not found"}"#).await;
        let backend = backend_for(base_url);

        let err = backend
            .generate("text", &PromptTemplate::new("{text}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Backend(_)));
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_backend_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let backend = backend_for(format!("http://{}", address));
        let err = backend
            .generate("text", &PromptTemplate::new("{text}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Backend(_)));
    }
}
