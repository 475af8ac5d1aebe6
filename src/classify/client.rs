//! Completion client for OpenAI-compatible chat APIs.
//!
//! Works against `api.openai.com` and any server exposing the same
//! `/chat/completions` shape (Ollama, llama.cpp server, vLLM). Image content
//! is inlined as a base64 `data:` URL.

use std::time::Duration;

use base64::Engine as _;

use crate::config::LlmConfig;
use crate::error::ClassificationError;

/// User-side payload of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContent {
    Text(String),
    Image {
        prompt: String,
        media_type: String,
        bytes: Vec<u8>,
    },
}

/// One request to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub content: CompletionContent,
}

impl CompletionRequest {
    /// JSON body for `/chat/completions`.
    pub fn to_body(&self) -> serde_json::Value {
        let user_content = match &self.content {
            CompletionContent::Text(text) => serde_json::Value::String(text.clone()),
            CompletionContent::Image {
                prompt,
                media_type,
                bytes,
            } => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::json!([
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{media_type};base64,{encoded}") }
                    }
                ])
            }
        };

        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system },
                { "role": "user", "content": user_content },
            ],
            "temperature": 0.2,
        })
    }
}

/// A service that answers completion requests with free-form text.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ClassificationError>;
}

/// Pull the assistant text out of a `/chat/completions` response body.
pub fn parse_completion(body: &str) -> Result<String, ClassificationError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ClassificationError::Malformed {
            message: e.to_string(),
        })?;

    if let Some(err) = json["error"]["message"].as_str() {
        return Err(ClassificationError::Upstream {
            message: err.to_string(),
        });
    }

    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ClassificationError::Malformed {
            message: "missing 'choices[0].message.content' field".into(),
        })
}

/// Blocking HTTP client built on `ureq`.
pub struct HttpCompletionClient {
    base_url: String,
    api_key: Option<String>,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl HttpCompletionClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout_secs,
            agent,
        }
    }

    /// Build from the `[llm]` config table, reading the API key from the environment.
    pub fn from_config(config: &LlmConfig) -> Self {
        let api_key = config.api_key();
        if api_key.is_none() {
            tracing::warn!(
                var = %config.api_key_env,
                "no API key in environment; requests will be sent unauthenticated"
            );
        }
        Self::new(config.base_url.clone(), api_key, config.timeout_secs)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ClassificationError> {
        let body_str = serde_json::to_string(&request.to_body()).map_err(|e| {
            ClassificationError::Upstream {
                message: format!("JSON serialize error: {e}"),
            }
        })?;

        let mut call = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            call = call.set("Authorization", &format!("Bearer {key}"));
        }

        let resp = call.send_string(&body_str).map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                let detail = resp.into_string().unwrap_or_default();
                ClassificationError::Upstream {
                    message: format!("server returned status {code}: {}", detail.trim()),
                }
            }
            ureq::Error::Transport(t) if t.kind() == ureq::ErrorKind::Io => {
                ClassificationError::Upstream {
                    message: format!("request failed or timed out after {}s: {t}", self.timeout_secs),
                }
            }
            other => ClassificationError::Upstream {
                message: other.to_string(),
            },
        })?;

        let resp_str = resp.into_string().map_err(|e| ClassificationError::Malformed {
            message: e.to_string(),
        })?;

        parse_completion(&resp_str)
    }
}

impl std::fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
