//! Anthropic messages API.

use super::{join_text_parts, token_count, trim_base, ChatDialect};
use loraix_core::types::{system_prompt, ProviderRequest, Role, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Map, Value};

/// Default `anthropic-version` header value
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic requires `max_tokens`; this is sent when the request has none
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic `/messages` dialect
#[derive(Debug, Clone)]
pub struct Anthropic {
    version: String,
}

impl Anthropic {
    pub fn new() -> Self {
        Self {
            version: DEFAULT_ANTHROPIC_VERSION.to_string(),
        }
    }

    /// Override the `anthropic-version` header
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

impl Default for Anthropic {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatDialect for Anthropic {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn default_base_url(&self) -> Option<String> {
        Some("https://api.anthropic.com/v1".to_string())
    }

    fn endpoint(&self, base_url: &str, _req: &ProviderRequest, _stream: bool) -> String {
        format!("{}/messages", trim_base(base_url))
    }

    fn authorize(&self, builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        let builder = builder.header("anthropic-version", &self.version);
        match api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    fn body(&self, req: &ProviderRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
            .collect();

        let mut body = Map::new();
        body.insert("model".into(), json!(req.model));
        body.insert("messages".into(), Value::Array(messages));
        if let Some(system) = system_prompt(&req.messages) {
            body.insert("system".into(), Value::String(system));
        }
        if let Some(temperature) = req.temperature {
            body.insert("temperature".into(), json!(temperature));
        }
        body.insert(
            "max_tokens".into(),
            json!(req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        );
        if stream {
            body.insert("stream".into(), Value::Bool(true));
        }
        Value::Object(body)
    }

    fn text(&self, response: &Value) -> String {
        response
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                join_text_parts(
                    parts
                        .iter()
                        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text")),
                )
            })
            .unwrap_or_default()
    }

    fn usage(&self, response: &Value) -> Option<Usage> {
        let prompt_tokens = token_count(response, "/usage/input_tokens");
        let completion_tokens = token_count(response, "/usage/output_tokens");
        let total_tokens = match (prompt_tokens, completion_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        };

        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
        .non_empty()
    }

    fn delta(&self, payload: &Value) -> Option<String> {
        payload
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loraix_core::types::ChatMessage;

    #[test]
    fn test_body_hoists_system_prompt() {
        let req = ProviderRequest::new(
            "claude-3-5-haiku-latest",
            vec![
                ChatMessage::system("Be brief."),
                ChatMessage::user("hi"),
                ChatMessage::system("No emoji."),
                ChatMessage::assistant("hello"),
            ],
        );
        let body = Anthropic::new().body(&req, false);

        assert_eq!(body["system"], json!("Be brief.\nNo emoji."));
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ])
        );
        assert_eq!(body["max_tokens"], json!(1024));
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_body_without_system() {
        let req = ProviderRequest::new("m", vec![ChatMessage::user("hi")]).with_max_tokens(50);
        let body = Anthropic::new().body(&req, true);
        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], json!(50));
        assert_eq!(body["stream"], json!(true));
    }

    #[test]
    fn test_text_joins_text_blocks() {
        let response = json!({
            "content": [
                {"type": "text", "text": "Hel"},
                {"type": "tool_use", "text": "ignored"},
                {"type": "text", "text": "lo"}
            ]
        });
        assert_eq!(Anthropic::new().text(&response), "Hello");
    }

    #[test]
    fn test_usage_total_needs_both_counts() {
        let dialect = Anthropic::new();
        let both = json!({"usage": {"input_tokens": 5, "output_tokens": 7}});
        assert_eq!(dialect.usage(&both).unwrap().total_tokens, Some(12));

        let partial = json!({"usage": {"input_tokens": 5}});
        let usage = dialect.usage(&partial).unwrap();
        assert_eq!(usage.prompt_tokens, Some(5));
        assert_eq!(usage.total_tokens, None);

        assert_eq!(dialect.usage(&json!({})), None);
    }

    #[test]
    fn test_delta() {
        let dialect = Anthropic::new();
        let event = json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Hi"}});
        assert_eq!(dialect.delta(&event), Some("Hi".to_string()));
        assert_eq!(dialect.delta(&json!({"type": "message_stop"})), None);
    }
}
