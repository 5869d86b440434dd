//! OpenAI-compatible captioning client.
//!
//! Works with OpenAI and any other service implementing the chat completions
//! API. Every failure path, transport, parse, or schema, degrades to the
//! rules fallback; callers never see an error.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::schema::{rules_fallback, CaptionInput, CaptionOutput};

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a music mood analyst. Return valid JSON only following the \
provided schema. Use the stats (valence≈positivity, energy, danceability, tempo), top genres, \
and artist examples. Make captions specific but under 18 words. Avoid buzzwords. No profanity.";

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("no API key configured")]
    NoApiKey,
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("API returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("schema validation failed: {0}")]
    Schema(String),
}

/// Captioning gateway backed by a chat-completions endpoint.
pub struct CaptionClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl CaptionClient {
    /// # Arguments
    /// * `base_url` - Base URL of the API (e.g., "https://api.openai.com/v1").
    /// * `model` - Model to use (e.g., "gpt-4o-mini").
    /// * `api_key` - Optional API key; without one every call falls back.
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    /// Produce a caption set for the snapshot input. Infallible by design:
    /// any model trouble yields the deterministic rules output.
    pub async fn generate(&self, input: &CaptionInput) -> CaptionOutput {
        match self.try_generate(input).await {
            Ok(output) => output,
            Err(CaptionError::NoApiKey) => rules_fallback(input),
            Err(err) => {
                info!("caption model failed, using rules fallback: {}", err);
                rules_fallback(input)
            }
        }
    }

    async fn try_generate(&self, input: &CaptionInput) -> Result<CaptionOutput, CaptionError> {
        let api_key = self.api_key.as_deref().ok_or(CaptionError::NoApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Analyze this listening snapshot and produce JSON that matches the schema.\n{}",
                        serde_json::to_string(input)
                            .map_err(|e| CaptionError::InvalidResponse(e.to_string()))?
                    ),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(model = %self.model, "sending caption completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(COMPLETION_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaptionError::Timeout
                } else {
                    CaptionError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CaptionError::InvalidResponse(e.to_string()))?;
        parse_completion(&body)
    }
}

/// Parse and validate a chat-completions body into a caption set.
fn parse_completion(body: &str) -> Result<CaptionOutput, CaptionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| CaptionError::InvalidResponse(e.to_string()))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CaptionError::InvalidResponse("no choices in response".to_string()))?;

    let output: CaptionOutput = serde_json::from_str(&content).map_err(|e| {
        warn!("caption model returned unparseable JSON");
        CaptionError::InvalidResponse(e.to_string())
    })?;

    output.validate().map_err(CaptionError::Schema)?;
    Ok(output)
}

// Chat completions wire types.

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Stats;

    fn input() -> CaptionInput {
        CaptionInput {
            stats: Stats {
                energy_avg: 0.5,
                valence_avg: 0.5,
                danceability_avg: 0.5,
                tempo_avg: 110.0,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_api_key_uses_fallback() {
        let client = CaptionClient::new(Client::new(), "http://localhost:9", "test-model", None);
        let output = client.generate(&input()).await;
        assert_eq!(output, rules_fallback(&input()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_uses_fallback() {
        // Port 9 (discard) refuses connections immediately.
        let client = CaptionClient::new(
            Client::new(),
            "http://127.0.0.1:9",
            "test-model",
            Some("key".to_string()),
        );
        let output = client.generate(&input()).await;
        assert_eq!(output, rules_fallback(&input()));
    }

    /// A caption JSON that parses but breaks the schema (no mood tags).
    fn schema_invalid_content() -> String {
        serde_json::json!({
            "mood_tags": [],
            "activities": ["coding"],
            "energy_band": "low",
            "top_motifs": [],
            "primary_caption": "quiet",
            "alt_captions": [],
            "playlist_titles": [],
            "cover_prompt": "fog",
        })
        .to_string()
    }

    #[test]
    fn test_schema_violation_is_rejected_at_parse() {
        let body = serde_json::json!({
            "choices": [{ "message": { "content": schema_invalid_content() } }],
        })
        .to_string();
        let err = parse_completion(&body).unwrap_err();
        assert!(matches!(err, CaptionError::Schema(_)));
    }

    #[test]
    fn test_missing_choices_is_invalid_response() {
        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, CaptionError::InvalidResponse(_)));
    }

    /// One-shot HTTP double: accepts a single connection, reads the whole
    /// request, answers with the given JSON body.
    async fn serve_one(listener: tokio::net::TcpListener, body: String) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + content_length {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_invalid_model_output_uses_fallback() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = serde_json::json!({
            "choices": [{ "message": { "content": schema_invalid_content() } }],
        })
        .to_string();
        let server = tokio::spawn(serve_one(listener, body));

        let client = CaptionClient::new(
            Client::new(),
            format!("http://{}", addr),
            "test-model",
            Some("key".to_string()),
        );
        let output = client.generate(&input()).await;
        assert_eq!(output, rules_fallback(&input()));

        server.await.unwrap();
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "system",
                content: "s".to_string(),
            }],
            temperature: 0.7,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
    }
}
