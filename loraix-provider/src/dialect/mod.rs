//! Vendor dialects for the generic HTTP chat adapter.
//!
//! Every vendor API in this crate follows the same shape: build a JSON
//! body, POST it, check the status, then read either one JSON document or
//! a stream of incremental deltas. A dialect fills in the vendor-specific
//! parts of that shape and nothing else.

mod anthropic;
mod azure;
mod bedrock;
mod gemini;
mod openai;

pub use anthropic::Anthropic;
pub use azure::AzureOpenAi;
pub use bedrock::Bedrock;
pub use gemini::Gemini;
pub use openai::OpenAiCompatible;

use loraix_core::error::LoraixError;
use loraix_core::types::{ProviderRequest, Usage};
use reqwest::RequestBuilder;
use serde_json::Value;
use std::fmt::Debug;

/// How a streaming response body is framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// Server-sent events, one JSON payload per `data:` field
    Sse,
    /// `application/vnd.amazon.eventstream` binary frames
    AwsEventStream,
}

/// Vendor-specific request and response shapes.
pub trait ChatDialect: Send + Sync + Debug + 'static {
    /// Provider id used when the caller does not pick one
    fn id(&self) -> &str;

    /// Human readable provider name
    fn name(&self) -> &str;

    /// Base URL used when the builder was not given one
    fn default_base_url(&self) -> Option<String>;

    /// Validate the API key handed to the builder.
    ///
    /// The error is appended to the provider name, as in
    /// "OpenAI requires an API key."
    fn check_api_key(&self, api_key: Option<&str>) -> Result<(), String> {
        match api_key {
            Some(_) => Ok(()),
            None => Err("requires an API key.".to_string()),
        }
    }

    /// Full endpoint URL, without credentials
    fn endpoint(&self, base_url: &str, req: &ProviderRequest, stream: bool) -> String;

    /// Attach credentials to an outgoing request
    fn authorize(&self, builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder;

    /// Sign the fully built request, for vendors that authenticate each
    /// request against its exact bytes
    fn sign(&self, _request: &mut reqwest::Request) -> Result<(), LoraixError> {
        Ok(())
    }

    /// JSON request body
    fn body(&self, req: &ProviderRequest, stream: bool) -> Value;

    /// Extract the generated text from a complete response
    fn text(&self, response: &Value) -> String;

    /// Extract token usage from a complete response
    fn usage(&self, response: &Value) -> Option<Usage>;

    /// Framing of streaming responses
    fn framing(&self) -> StreamFraming {
        StreamFraming::Sse
    }

    /// Extract the text delta carried by one stream payload, if any
    fn delta(&self, payload: &Value) -> Option<String>;

    /// Extract the text delta of one typed event-stream message
    fn event_delta(&self, event_type: &str, payload: &Value) -> Option<String> {
        let _ = event_type;
        self.delta(payload)
    }
}

/// Bearer authentication shared by the OpenAI-style dialects
pub(crate) fn bearer(builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => builder.bearer_auth(key),
        None => builder,
    }
}

/// Read an optional token count, ignoring anything that is not a u32
pub(crate) fn token_count(value: &Value, pointer: &str) -> Option<u32> {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// Concatenate `text` fields of an array of content parts
pub(crate) fn join_text_parts<'a>(parts: impl IntoIterator<Item = &'a Value>) -> String {
    parts
        .into_iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect()
}

/// Trim trailing slashes so endpoint paths can be appended verbatim
pub(crate) fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_count_rejects_non_integers() {
        let body = json!({"usage": {"a": 12, "b": "12", "c": -1}});
        assert_eq!(token_count(&body, "/usage/a"), Some(12));
        assert_eq!(token_count(&body, "/usage/b"), None);
        assert_eq!(token_count(&body, "/usage/c"), None);
        assert_eq!(token_count(&body, "/usage/missing"), None);
    }

    #[test]
    fn test_join_text_parts_skips_non_text() {
        let parts = json!([{"text": "a"}, {"image": "x"}, {"text": "b"}]);
        assert_eq!(join_text_parts(parts.as_array().unwrap()), "ab");
    }
}
