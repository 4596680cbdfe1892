//! OpenAI chat completions and the vendors that speak the same protocol.

use super::{bearer, token_count, trim_base, ChatDialect};
use loraix_core::types::{ProviderRequest, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Map, Value};

/// OpenAI-compatible `/chat/completions` dialect.
///
/// OpenAI, DeepSeek and Grok differ only in base URL and provider id.
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    id: String,
    name: String,
    base_url: Option<String>,
}

impl OpenAiCompatible {
    /// Dialect for any OpenAI-compatible endpoint
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: None,
        }
    }

    /// Set the default base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// OpenAI
    pub fn openai() -> Self {
        Self::new("openai", "OpenAI").with_base_url("https://api.openai.com/v1")
    }

    /// DeepSeek
    pub fn deepseek() -> Self {
        Self::new("deepseek", "DeepSeek").with_base_url("https://api.deepseek.com/v1")
    }

    /// xAI Grok
    pub fn grok() -> Self {
        Self::new("grok", "Grok").with_base_url("https://api.x.ai/v1")
    }
}

/// Request body shared with Azure OpenAI, which omits `model`
pub(crate) fn chat_completions_body(
    req: &ProviderRequest,
    stream: bool,
    include_model: bool,
) -> Value {
    let mut body = Map::new();
    if include_model {
        body.insert("model".into(), json!(req.model));
    }
    body.insert("messages".into(), json!(req.messages));
    if let Some(temperature) = req.temperature {
        body.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = req.max_tokens {
        body.insert("max_tokens".into(), json!(max_tokens));
    }
    if stream {
        body.insert("stream".into(), Value::Bool(true));
    }
    Value::Object(body)
}

pub(crate) fn chat_completions_text(response: &Value) -> String {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn chat_completions_usage(response: &Value) -> Option<Usage> {
    Usage {
        prompt_tokens: token_count(response, "/usage/prompt_tokens"),
        completion_tokens: token_count(response, "/usage/completion_tokens"),
        total_tokens: token_count(response, "/usage/total_tokens"),
    }
    .non_empty()
}

pub(crate) fn chat_completions_delta(payload: &Value) -> Option<String> {
    payload
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ChatDialect for OpenAiCompatible {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn default_base_url(&self) -> Option<String> {
        self.base_url.clone()
    }

    fn endpoint(&self, base_url: &str, _req: &ProviderRequest, _stream: bool) -> String {
        format!("{}/chat/completions", trim_base(base_url))
    }

    fn authorize(&self, builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        bearer(builder, api_key)
    }

    fn body(&self, req: &ProviderRequest, stream: bool) -> Value {
        chat_completions_body(req, stream, true)
    }

    fn text(&self, response: &Value) -> String {
        chat_completions_text(response)
    }

    fn usage(&self, response: &Value) -> Option<Usage> {
        chat_completions_usage(response)
    }

    fn delta(&self, payload: &Value) -> Option<String> {
        chat_completions_delta(payload)
    }
}
