/// LLM Client: the single point of entry for all oracle calls in Crackify.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Adapters depend on the `Oracle` trait; `LlmClient` is the production implementation.
///
/// Models are hardcoded per tier.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::resume::Attachment;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Discovery and detail fetch.
pub const FAST_MODEL: &str = "claude-haiku-4-5";
/// Fit analysis.
pub const DEEP_MODEL: &str = "claude-sonnet-4-5";
const FAST_MAX_TOKENS: u32 = 4096;
const DEEP_MAX_TOKENS: u32 = 16000;
/// Cap on server-side searches per call.
const WEB_SEARCH_MAX_USES: u32 = 5;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Which model a request runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Deep,
}

impl ModelTier {
    pub fn model(self) -> &'static str {
        match self {
            ModelTier::Fast => FAST_MODEL,
            ModelTier::Deep => DEEP_MODEL,
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            ModelTier::Fast => FAST_MAX_TOKENS,
            ModelTier::Deep => DEEP_MAX_TOKENS,
        }
    }
}

/// One piece of the user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Attachment(Attachment),
}

/// A provider-neutral oracle request.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub tier: ModelTier,
    pub system: Option<String>,
    pub parts: Vec<Part>,
    /// Lets the oracle search the web before answering.
    pub web_search: bool,
}

impl OracleRequest {
    pub fn new(tier: ModelTier) -> Self {
        Self {
            tier,
            system: None,
            parts: Vec::new(),
            web_search: false,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.parts.push(Part::Attachment(attachment));
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    /// All text parts joined by newlines.
    #[cfg(test)]
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Attachment(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The external reasoning service. Returns the response text, possibly empty.
///
/// Carried in `AppState` as `Arc<dyn Oracle>`.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, request: OracleRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text {
        text: &'a str,
    },
    Image {
        source: Base64Source<'a>,
    },
    Document {
        source: Base64Source<'a>,
        title: &'a str,
    },
}

#[derive(Debug, Serialize)]
struct Base64Source<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    max_uses: u32,
}

impl<'a> From<&'a Part> for ContentPart<'a> {
    fn from(part: &'a Part) -> Self {
        match part {
            Part::Text(text) => ContentPart::Text { text },
            Part::Attachment(file) => {
                let source = Base64Source {
                    kind: "base64",
                    media_type: &file.mime_type,
                    data: &file.data,
                };
                if file.is_pdf() {
                    ContentPart::Document {
                        source,
                        title: &file.name,
                    }
                } else {
                    ContentPart::Image { source }
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every text block. With web search enabled the answer is
    /// split across several blocks interleaved with tool results.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<String>()
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Wraps the Anthropic Messages API with optional retries and per-tier timeouts.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    max_attempts: u32,
    fast_timeout: Duration,
    deep_timeout: Option<Duration>,
}

impl LlmClient {
    pub fn new(
        api_key: String,
        max_attempts: u32,
        fast_timeout: Duration,
        deep_timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()?,
            api_key,
            max_attempts: max_attempts.max(1),
            fast_timeout,
            deep_timeout,
        })
    }

    fn timeout_for(&self, tier: ModelTier) -> Option<Duration> {
        match tier {
            ModelTier::Fast => Some(self.fast_timeout),
            ModelTier::Deep => self.deep_timeout,
        }
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff when
    /// more than one attempt is configured.
    pub async fn call(&self, request: &OracleRequest) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: request.tier.model(),
            max_tokens: request.tier.max_tokens(),
            system: request.system.as_deref(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.parts.iter().map(ContentPart::from).collect(),
            }],
            tools: if request.web_search {
                vec![ToolSpec {
                    kind: "web_search_20250305",
                    name: "web_search",
                    max_uses: WEB_SEARCH_MAX_USES,
                }]
            } else {
                Vec::new()
            },
        };
        let timeout = self.timeout_for(request.tier);

        let mut attempt: u32 = 1;

        loop {
            let mut builder = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body);
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }

            let error = match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        warn!("LLM API returned {}: {}", status, body);
                        LlmError::Api {
                            status: status.as_u16(),
                            message: body,
                        }
                    } else if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        let message = serde_json::from_str::<AnthropicError>(&body)
                            .map(|e| e.error.message)
                            .unwrap_or(body);
                        return Err(LlmError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    } else {
                        let llm_response: LlmResponse = response.json().await?;

                        debug!(
                            "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
                            request.tier.model(),
                            llm_response.usage.input_tokens,
                            llm_response.usage.output_tokens
                        );

                        return Ok(llm_response);
                    }
                }
                Err(e) if e.is_timeout() => {
                    LlmError::Timeout(timeout.map(|t| t.as_secs()).unwrap_or_default())
                }
                Err(e) => LlmError::Http(e),
            };

            if attempt >= self.max_attempts {
                return Err(give_up(error, attempt));
            }

            // Exponential backoff: 1s, 2s, 4s, capped at 32s
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(
                "LLM call attempt {} failed ({}), retrying after {}ms...",
                attempt,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// The error reported once every attempt has failed. A final 429 becomes
/// `RateLimited`.
fn give_up(error: LlmError, attempts: u32) -> LlmError {
    match error {
        LlmError::Api { status: 429, .. } => LlmError::RateLimited { attempts },
        other => other,
    }
}

#[async_trait]
impl Oracle for LlmClient {
    async fn generate(&self, request: OracleRequest) -> Result<String, LlmError> {
        let response = self.call(&request).await?;
        Ok(response.text())
    }
}

/// Deserializes a JSON payload out of free-form model output.
///
/// Tolerates markdown fences and prose around the payload, which web-search
/// answers often carry.
pub fn parse_json_payload<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) => match extract_json_span(text) {
            Some(span) if span.len() < text.len() => {
                serde_json::from_str(span).map_err(LlmError::Parse)
            }
            _ => Err(LlmError::Parse(err)),
        },
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// The outermost `{...}` or `[...]` span, whichever opens first.
fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_payload_skips_surrounding_prose() {
        let input = "Here are the postings I found:\n[{\"n\": 1}, {\"n\": 2}]\nGood luck!";
        let parsed: Vec<serde_json::Value> = parse_json_payload(input).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_parse_json_payload_empty_is_error() {
        let result: Result<serde_json::Value, _> = parse_json_payload("  ");
        assert!(matches!(result, Err(LlmError::EmptyContent)));
    }

    #[test]
    fn test_parse_json_payload_garbage_is_parse_error() {
        let result: Result<serde_json::Value, _> = parse_json_payload("no json here");
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let json = r#"{
            "content": [
                {"type": "server_tool_use", "id": "srv_1", "name": "web_search", "input": {}},
                {"type": "web_search_tool_result", "tool_use_id": "srv_1", "content": []},
                {"type": "text", "text": "[{\"a\":"},
                {"type": "text", "text": " 1}]"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let response: LlmResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "[{\"a\": 1}]");
    }

    #[test]
    fn test_request_serializes_attachments_and_tools() {
        let pdf = Attachment::from_bytes("cv.pdf", "application/pdf", b"pdf").unwrap();
        let png = Attachment::from_bytes("cv.png", "image/png", b"png").unwrap();
        let request = OracleRequest::new(ModelTier::Deep)
            .attachment(pdf)
            .attachment(png)
            .text("analyze")
            .with_web_search();
        let body = AnthropicRequest {
            model: request.tier.model(),
            max_tokens: request.tier.max_tokens(),
            system: None,
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.parts.iter().map(ContentPart::from).collect(),
            }],
            tools: vec![ToolSpec {
                kind: "web_search_20250305",
                name: "web_search",
                max_uses: WEB_SEARCH_MAX_USES,
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        let content = &value["messages"][0]["content"];
        assert_eq!(content[0]["type"], "document");
        assert_eq!(content[0]["source"]["media_type"], "application/pdf");
        assert_eq!(content[0]["title"], "cv.pdf");
        assert_eq!(content[1]["type"], "image");
        assert_eq!(content[2]["text"], "analyze");
        assert_eq!(value["tools"][0]["name"], "web_search");
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_prompt_text_skips_attachments() {
        let png = Attachment::from_bytes("cv.png", "image/png", b"png").unwrap();
        let request = OracleRequest::new(ModelTier::Fast)
            .text("one")
            .attachment(png)
            .text("two");
        assert_eq!(request.prompt_text(), "one\ntwo");
    }

    #[test]
    fn test_tiers_use_distinct_models() {
        assert_ne!(ModelTier::Fast.model(), ModelTier::Deep.model());
    }

    #[test]
    fn test_final_429_reports_rate_limit() {
        let error = LlmError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        let reported = give_up(error, 3);
        assert!(matches!(reported, LlmError::RateLimited { attempts: 3 }));
        assert_eq!(reported.to_string(), "Rate limited after 3 attempt(s)");
    }

    #[test]
    fn test_final_server_error_is_kept() {
        let error = LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(matches!(
            give_up(error, 1),
            LlmError::Api { status: 503, .. }
        ));
        assert!(matches!(give_up(LlmError::Timeout(120), 1), LlmError::Timeout(120)));
    }
}
