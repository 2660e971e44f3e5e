use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use trailhead_store::ConfigMap;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no model endpoint configured")]
    Disabled,
    #[error("model call timed out")]
    Timeout,
    #[error("model transport error: {0}")]
    Transport(String),
    #[error("model endpoint returned HTTP {0}")]
    Status(u16),
    #[error("model response malformed: {0}")]
    Malformed(String),
}

/// A single-turn text completion. Every call carries its own budget; a
/// timeout is reported as [`ModelError::Timeout`] and callers treat it like
/// any other failure.
pub trait ModelClient {
    fn call(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, ModelError>;
}

/// Always fails with [`ModelError::Disabled`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModel;

impl ModelClient for NoModel {
    fn call(&self, _: &str, _: &str, _: u32, _: Duration) -> Result<String, ModelError> {
        Err(ModelError::Disabled)
    }
}

// ── Config ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    /// `POST {endpoint}` with an OpenAI `chat/completions` body.
    OpenAiCompat,
    /// `POST {endpoint}` with an Anthropic `messages` body.
    Anthropic,
}

impl ApiKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compat" | "chat" => Some(ApiKind::OpenAiCompat),
            "anthropic" | "messages" => Some(ApiKind::Anthropic),
            _ => None,
        }
    }

    fn default_key_env(&self) -> &'static str {
        match self {
            ApiKind::OpenAiCompat => "OPENAI_API_KEY",
            ApiKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ApiKind::OpenAiCompat => "gpt-4o-mini",
            ApiKind::Anthropic => "claude-3-5-haiku-latest",
        }
    }
}

pub const DEFAULT_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_MAX_TOKENS: u32 = 400;

/// Model settings from `config.json` keys `model.*` (env overrides).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: Option<String>,
    pub model: String,
    pub api: ApiKind,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn load(cfg: &ConfigMap) -> Self {
        let endpoint = cfg.string_knob("model.endpoint", "TRAILHEAD_MODEL_ENDPOINT");
        let api = cfg
            .string_knob("model.api", "TRAILHEAD_MODEL_API")
            .and_then(|s| ApiKind::parse(&s))
            .unwrap_or_else(|| match endpoint.as_deref() {
                Some(url) if url.contains("anthropic.com") || url.ends_with("/messages") => {
                    ApiKind::Anthropic
                }
                _ => ApiKind::OpenAiCompat,
            });
        let model = cfg
            .string_knob("model.name", "TRAILHEAD_MODEL")
            .unwrap_or_else(|| api.default_model().to_string());
        let key_env = cfg
            .string_knob("model.api_key_env", "TRAILHEAD_MODEL_API_KEY_ENV")
            .unwrap_or_else(|| api.default_key_env().to_string());
        let api_key = std::env::var(&key_env).ok().filter(|k| !k.trim().is_empty());
        let timeout_ms = cfg.u64_knob("model.timeout_ms", "TRAILHEAD_MODEL_TIMEOUT_MS", DEFAULT_TIMEOUT_MS);
        let max_tokens = cfg.u64_knob(
            "model.max_tokens",
            "TRAILHEAD_MODEL_MAX_TOKENS",
            u64::from(DEFAULT_MAX_TOKENS),
        );
        Self {
            endpoint,
            model,
            api,
            api_key,
            timeout: Duration::from_millis(timeout_ms.max(1)),
            max_tokens: u32::try_from(max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    /// No endpoint, default budgets. Ignores env and config.
    pub fn disabled() -> Self {
        let api = ApiKind::OpenAiCompat;
        Self {
            endpoint: None,
            model: api.default_model().to_string(),
            api,
            api_key: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// The configured client, or [`NoModel`] when no endpoint is set.
    pub fn client(&self) -> Box<dyn ModelClient> {
        match &self.endpoint {
            Some(endpoint) => Box::new(HttpModel {
                endpoint: endpoint.clone(),
                model: self.model.clone(),
                api: self.api,
                api_key: self.api_key.clone(),
            }),
            None => Box::new(NoModel),
        }
    }
}

// ── HTTP ──

#[derive(Debug, Clone)]
pub struct HttpModel {
    pub endpoint: String,
    pub model: String,
    pub api: ApiKind,
    pub api_key: Option<String>,
}

impl ModelClient for HttpModel {
    fn call(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, ModelError> {
        let body = request_body(self.api, &self.model, system, user, max_tokens);
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        let mut req = agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        match (self.api, self.api_key.as_deref()) {
            (ApiKind::Anthropic, key) => {
                req = req.header("anthropic-version", "2023-06-01");
                if let Some(key) = key {
                    req = req.header("x-api-key", key);
                }
            }
            (ApiKind::OpenAiCompat, Some(key)) => {
                req = req.header("Authorization", &format!("Bearer {key}"));
            }
            (ApiKind::OpenAiCompat, None) => {}
        }

        tracing::debug!(endpoint = %self.endpoint, model = %self.model, ?timeout, "model call");
        let mut resp = req.send(body.to_string()).map_err(map_ureq_error)?;
        let text = resp.body_mut().read_to_string().map_err(map_ureq_error)?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| ModelError::Malformed(e.to_string()))?;
        response_text(self.api, &value)
            .ok_or_else(|| ModelError::Malformed("no completion text in response".into()))
    }
}

fn map_ureq_error(err: ureq::Error) -> ModelError {
    match err {
        ureq::Error::Timeout(_) => ModelError::Timeout,
        ureq::Error::StatusCode(code) => ModelError::Status(code),
        ureq::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => ModelError::Timeout,
        other => ModelError::Transport(other.to_string()),
    }
}

fn request_body(api: ApiKind, model: &str, system: &str, user: &str, max_tokens: u32) -> Value {
    match api {
        ApiKind::OpenAiCompat => serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        }),
        ApiKind::Anthropic => serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [
                {"role": "user", "content": user},
            ],
        }),
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn response_text(api: ApiKind, value: &Value) -> Option<String> {
    match api {
        ApiKind::OpenAiCompat => {
            let resp: ChatResponse = serde_json::from_value(value.clone()).ok()?;
            resp.choices.into_iter().find_map(|c| c.message.content)
        }
        ApiKind::Anthropic => {
            let resp: MessagesResponse = serde_json::from_value(value.clone()).ok()?;
            let text: Vec<String> = resp
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.text)
                .collect();
            (!text.is_empty()).then(|| text.join(""))
        }
    }
}

// ── Response decoding ──

/// First JSON object or array embedded in `text`. Code fences and any
/// prose before or after the payload are ignored.
pub fn extract_json(text: &str) -> Option<Value> {
    let body = strip_fences(text);
    for (i, ch) in body.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&body[i..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_object() || value.is_array() {
                return Some(value);
            }
        }
    }
    None
}

fn strip_fences(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text.trim();
    };
    let after = &text[start + 3..];
    // Skip the info string (`json`) on the opening fence line.
    let after = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}
