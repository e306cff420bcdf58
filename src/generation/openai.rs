//! OpenAI-compatible chat-completions provider.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    GenerateRequest, GeneratedQuestion, GenerationError, GenerationResult, QuestionGenerator,
    parse::parse_generated,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SYSTEM_PROMPT: &str = "You write accurate multiple-choice Bible trivia questions. \
    Every question must be answerable from the cited passage. Reply with a single JSON object \
    and nothing else.";

/// Connection settings for the provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Read `OPENAI_*` variables; `None` when no API key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let model = std::env::var("OPENAI_MODEL")
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        let timeout = std::env::var("GENERATION_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Some(Self {
            api_key,
            base_url,
            model,
            timeout,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

struct Inner {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

/// Generator backed by `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct OpenAiGenerator {
    inner: Arc<Inner>,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> GenerationResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GenerationError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
                api_key: config.api_key,
                model: config.model,
                timeout: config.timeout,
            }),
        })
    }

    async fn complete(&self, request: GenerateRequest) -> GenerationResult<GeneratedQuestion> {
        let inner = &self.inner;
        let prompt = request.prompt();
        let body = ChatRequest {
            model: &inner.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.8,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let timeout = request.timeout.min(inner.timeout);

        let send = inner
            .client
            .post(&inner.endpoint)
            .bearer_auth(&inner.api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| GenerationError::Timeout(timeout))?
            .map_err(|err| {
                if err.is_timeout() {
                    GenerationError::Timeout(timeout)
                } else {
                    GenerationError::Api(err.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }
        if status.is_server_error() {
            return Err(GenerationError::Server(status.as_u16()));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GenerationError::Config(format!(
                "provider rejected credentials ({status})"
            )));
        }
        if !status.is_success() {
            return Err(GenerationError::Api(format!("unexpected status {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::Malformed(err.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Malformed("response has no choices".into()))?;
        if choice.finish_reason.as_deref() == Some("length") {
            return Err(GenerationError::Malformed("response truncated".into()));
        }
        let content = choice
            .message
            .content
            .ok_or_else(|| GenerationError::Malformed("response has no content".into()))?;
        debug!(reference = %request.reference, "generation reply received");
        parse_generated(&content)
    }
}

impl QuestionGenerator for OpenAiGenerator {
    fn generate(
        &self,
        request: GenerateRequest,
    ) -> BoxFuture<'static, GenerationResult<GeneratedQuestion>> {
        let generator = self.clone();
        Box::pin(async move { generator.complete(request).await })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_from_base_url() {
        let generator = OpenAiGenerator::new(OpenAiConfig {
            api_key: "test".into(),
            base_url: "http://localhost:9999/v1/".into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(
            generator.inner.endpoint,
            "http://localhost:9999/v1/chat/completions"
        );
        assert_eq!(generator.name(), "openai");
    }

    #[test]
    fn request_body_asks_for_json() {
        let body = ChatRequest {
            model: DEFAULT_MODEL,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "prompt",
                },
            ],
            temperature: 0.8,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][1]["role"], "user");
    }
}
