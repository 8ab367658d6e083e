// src/tools/llm.rs

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{ReaperError, Result};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const MODEL_ENV: &str = "CLAUDE_MODEL";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Total tries per request, the first one included.
pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_secs(1);

/// A text-in, text-out language model.
///
/// Implementations retry transient failures themselves; an `Err` means the
/// request is given up.
pub trait LanguageModel {
    fn send(
        &self,
        system_prompt: &str,
        user_message: &str,
        max_output_tokens: u32,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Rate limiting and upstream failures are worth another try.
pub fn is_retryable(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ...
pub fn retry_delay(attempt: u32) -> Duration {
    BASE_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// First text block of a Messages API response.
pub fn extract_text(payload: &Value) -> Result<String> {
    payload["content"]
        .as_array()
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|block| block["type"] == "text")
                .and_then(|block| block["text"].as_str())
        })
        .map(str::to_string)
        .ok_or_else(|| ReaperError::Provider {
            status: 200,
            message: "response contained no text content".to_string(),
        })
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(500).collect())
}

#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            endpoint: MESSAGES_URL.to_string(),
        }
    }

    /// Reads the API key and optional model override from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ReaperError::MissingCredential {
                variable: API_KEY_ENV.to_string(),
            })?;
        let model = std::env::var(MODEL_ENV)
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a tiny prompt and checks the reply.
    pub async fn health_check(&self) -> bool {
        match self
            .send("You are a health check assistant.", "Say OK", 10)
            .await
        {
            Ok(reply) => reply.to_uppercase().contains("OK"),
            Err(err) => {
                debug!(%err, "health check failed");
                false
            }
        }
    }
}

impl LanguageModel for AnthropicProvider {
    async fn send(
        &self,
        system_prompt: &str,
        user_message: &str,
        max_output_tokens: u32,
    ) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_output_tokens,
            "system": system_prompt,
            "messages": [{ "role": "user", "content": user_message }],
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await?;

            let status = response.status().as_u16();
            if response.status().is_success() {
                let payload: Value = response.json().await?;
                return extract_text(&payload);
            }

            let message = error_message(&response.text().await.unwrap_or_default());
            if is_retryable(status) && attempt < MAX_ATTEMPTS {
                let delay = retry_delay(attempt);
                warn!(attempt, status, delay_ms = delay.as_millis() as u64, %message, "provider request failed, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }
            return Err(ReaperError::Provider { status, message });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::Instant;

    use super::{
        AnthropicProvider, LanguageModel, error_message, extract_text, is_retryable, retry_delay,
    };
    use crate::error::ReaperError;

    const REPLY: &str = r#"{"content":[{"type":"text","text":"units lj"}]}"#;
    const RATE_LIMITED: &str = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Slow down"}}"#;
    const OVERLOADED: &str = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
    const UNAUTHORIZED: &str = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;

    /// Reads one request, headers and body, off the connection.
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        line.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .and_then(|value| value.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Answers one request per connection with the scripted replies, in order,
    /// and counts the requests it served.
    async fn scripted_server(replies: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let endpoint = format!("http://{}/v1/messages", listener.local_addr().expect("addr"));
        let served = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&served);
        tokio::spawn(async move {
            for (status, body) in replies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut stream).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (endpoint, served)
    }

    fn provider(endpoint: String) -> AnthropicProvider {
        AnthropicProvider {
            client: reqwest::Client::builder()
                .no_proxy()
                .build()
                .expect("client"),
            ..AnthropicProvider::new("test-key", "test-model")
        }
        .with_endpoint(endpoint)
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_request_is_retried() {
        let (endpoint, served) = scripted_server(vec![(429, RATE_LIMITED), (200, REPLY)]).await;
        let started = Instant::now();

        let reply = provider(endpoint)
            .send("system", "hello", 16)
            .await
            .expect("reply after retry");

        assert_eq!(reply, "units lj");
        assert_eq!(served.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_give_up_after_three_tries() {
        let replies = vec![(503, OVERLOADED), (503, OVERLOADED), (503, OVERLOADED), (200, REPLY)];
        let (endpoint, served) = scripted_server(replies).await;
        let started = Instant::now();

        let error = provider(endpoint)
            .send("system", "hello", 16)
            .await
            .expect_err("retries exhausted");

        assert!(
            matches!(&error, ReaperError::Provider { status: 503, message } if message == "Overloaded"),
            "{error:?}"
        );
        assert_eq!(served.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_fail_without_retrying() {
        let (endpoint, served) = scripted_server(vec![(401, UNAUTHORIZED), (200, REPLY)]).await;

        let error = provider(endpoint)
            .send("system", "hello", 16)
            .await
            .expect_err("unauthorized");

        assert!(
            matches!(&error, ReaperError::Provider { status: 401, message } if message == "invalid x-api-key"),
            "{error:?}"
        );
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn health_check_reads_the_reply() {
        let ok = r#"{"content":[{"type":"text","text":"ok"}]}"#;
        let (endpoint, _) = scripted_server(vec![(200, ok), (401, UNAUTHORIZED)]).await;
        let provider = provider(endpoint);

        assert_eq!(provider.model(), "test-model");
        assert!(provider.health_check().await);
        assert!(!provider.health_check().await);
    }

    #[test]
    fn only_rate_limits_and_server_errors_retry() {
        assert!(is_retryable(429));
        assert!(is_retryable(500));
        assert!(is_retryable(529));
        assert!(!is_retryable(400));
        assert!(!is_retryable(401));
        assert!(!is_retryable(200));
    }

    #[test]
    fn backoff_doubles_from_one_second() {
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn first_text_block_is_returned() {
        let payload = json!({
            "content": [
                { "type": "thinking", "thinking": "..." },
                { "type": "text", "text": "units lj" },
                { "type": "text", "text": "ignored" }
            ]
        });
        assert_eq!(extract_text(&payload).expect("text block"), "units lj");
    }

    #[test]
    fn response_without_text_is_a_provider_error() {
        let error = extract_text(&json!({ "content": [] })).expect_err("no text");
        assert!(error.to_string().contains("no text content"));
    }

    #[test]
    fn api_error_bodies_are_unwrapped() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(error_message(body), "Overloaded");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
    }
}
