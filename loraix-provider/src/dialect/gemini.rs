//! Google Gemini `generateContent` API.

use super::{join_text_parts, token_count, trim_base, ChatDialect};
use loraix_core::types::{system_prompt, ProviderRequest, Role, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Map, Value};

/// Gemini dialect; the API key travels as the `key` query parameter
#[derive(Debug, Clone, Default)]
pub struct Gemini;

impl Gemini {
    pub fn new() -> Self {
        Self
    }
}

impl ChatDialect for Gemini {
    fn id(&self) -> &str {
        "gemini"
    }

    fn name(&self) -> &str {
        "Gemini"
    }

    fn default_base_url(&self) -> Option<String> {
        Some("https://generativelanguage.googleapis.com/v1beta".to_string())
    }

    fn endpoint(&self, base_url: &str, req: &ProviderRequest, stream: bool) -> String {
        if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                trim_base(base_url),
                req.model
            )
        } else {
            format!("{}/models/{}:generateContent", trim_base(base_url), req.model)
        }
    }

    fn authorize(&self, builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        match api_key {
            Some(key) => builder.query(&[("key", key)]),
            None => builder,
        }
    }

    fn body(&self, req: &ProviderRequest, _stream: bool) -> Value {
        let contents: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut generation = Map::new();
        if let Some(temperature) = req.temperature {
            generation.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = req.max_tokens {
            generation.insert("maxOutputTokens".into(), json!(max_tokens));
        }

        let mut body = Map::new();
        body.insert("contents".into(), Value::Array(contents));
        if let Some(system) = system_prompt(&req.messages) {
            body.insert(
                "systemInstruction".into(),
                json!({"parts": [{"text": system}]}),
            );
        }
        body.insert("generationConfig".into(), Value::Object(generation));
        Value::Object(body)
    }

    fn text(&self, response: &Value) -> String {
        response
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .map(|parts| join_text_parts(parts))
            .unwrap_or_default()
    }

    fn usage(&self, response: &Value) -> Option<Usage> {
        Usage {
            prompt_tokens: token_count(response, "/usageMetadata/promptTokenCount"),
            completion_tokens: token_count(response, "/usageMetadata/candidatesTokenCount"),
            total_tokens: token_count(response, "/usageMetadata/totalTokenCount"),
        }
        .non_empty()
    }

    fn delta(&self, payload: &Value) -> Option<String> {
        Some(self.text(payload)).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loraix_core::types::ChatMessage;

    #[test]
    fn test_endpoint() {
        let req = ProviderRequest::new("gemini-1.5-flash", vec![]);
        let dialect = Gemini::new();
        assert_eq!(
            dialect.endpoint("https://g.example/v1beta/", &req, false),
            "https://g.example/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(
            dialect.endpoint("https://g.example/v1beta", &req, true),
            "https://g.example/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_body_maps_roles() {
        let req = ProviderRequest::new(
            "m",
            vec![
                ChatMessage::system("Be brief."),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
            ],
        )
        .with_temperature(0.2)
        .with_max_tokens(64);
        let body = Gemini::new().body(&req, false);

        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "model", "parts": [{"text": "hello"}]}
            ])
        );
        assert_eq!(
            body["systemInstruction"],
            json!({"parts": [{"text": "Be brief."}]})
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(64));
    }

    #[test]
    fn test_parse_response() {
        let dialect = Gemini::new();
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "Hi"}, {"text": " there"}]}}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        });
        assert_eq!(dialect.text(&response), "Hi there");
        assert_eq!(dialect.usage(&response).unwrap().total_tokens, Some(6));
        assert_eq!(dialect.text(&json!({"candidates": []})), "");
        assert_eq!(dialect.delta(&json!({"candidates": []})), None);
    }
}
