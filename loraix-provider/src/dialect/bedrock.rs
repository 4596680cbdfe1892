//! Amazon Bedrock Converse API.

use super::{join_text_parts, token_count, trim_base, ChatDialect, StreamFraming};
use crate::sigv4::{uri_encode, AwsCredentials, SigV4Signer};
use loraix_core::error::LoraixError;
use loraix_core::types::{system_prompt, ProviderRequest, Role, Usage};
use reqwest::RequestBuilder;
use serde_json::{json, Map, Value};

/// SigV4 signing name of the Bedrock runtime
const SIGNING_SERVICE: &str = "bedrock";

/// Bedrock Converse dialect.
///
/// Every request is signed with AWS SigV4 using the credentials given here;
/// API keys are rejected. A custom endpoint (VPC endpoint, proxy) can be
/// set with `api_base` on the provider builder and is still signed for
/// `region`.
#[derive(Debug, Clone)]
pub struct Bedrock {
    signer: SigV4Signer,
}

impl Bedrock {
    /// Dialect for the runtime endpoint of `region`
    pub fn new(region: impl Into<String>, credentials: AwsCredentials) -> Self {
        Self {
            signer: SigV4Signer::new(credentials, region, SIGNING_SERVICE),
        }
    }

    pub fn region(&self) -> &str {
        self.signer.region()
    }
}

impl ChatDialect for Bedrock {
    fn id(&self) -> &str {
        "bedrock"
    }

    fn name(&self) -> &str {
        "Amazon Bedrock"
    }

    fn default_base_url(&self) -> Option<String> {
        Some(format!(
            "https://bedrock-runtime.{}.amazonaws.com",
            self.signer.region()
        ))
    }

    fn check_api_key(&self, api_key: Option<&str>) -> Result<(), String> {
        match api_key {
            Some(_) => Err(
                "signs requests with AWS SigV4 credentials and does not accept an API key."
                    .to_string(),
            ),
            None => Ok(()),
        }
    }

    fn endpoint(&self, base_url: &str, req: &ProviderRequest, stream: bool) -> String {
        let action = if stream { "converse-stream" } else { "converse" };
        format!(
            "{}/model/{}/{}",
            trim_base(base_url),
            uri_encode(&req.model),
            action
        )
    }

    fn authorize(&self, builder: RequestBuilder, _api_key: Option<&str>) -> RequestBuilder {
        builder
    }

    fn sign(&self, request: &mut reqwest::Request) -> Result<(), LoraixError> {
        self.signer.sign(request, chrono::Utc::now())
    }

    fn body(&self, req: &ProviderRequest, _stream: bool) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({"role": m.role.as_str(), "content": [{"text": m.content}]}))
            .collect();

        let mut inference = Map::new();
        if let Some(temperature) = req.temperature {
            inference.insert("temperature".into(), json!(temperature));
        }
        if let Some(max_tokens) = req.max_tokens {
            inference.insert("maxTokens".into(), json!(max_tokens));
        }

        let mut body = Map::new();
        body.insert("messages".into(), Value::Array(messages));
        if let Some(system) = system_prompt(&req.messages) {
            body.insert("system".into(), json!([{"text": system}]));
        }
        body.insert("inferenceConfig".into(), Value::Object(inference));
        Value::Object(body)
    }

    fn text(&self, response: &Value) -> String {
        response
            .pointer("/output/message/content")
            .and_then(Value::as_array)
            .map(|parts| join_text_parts(parts))
            .unwrap_or_default()
    }

    fn usage(&self, response: &Value) -> Option<Usage> {
        Usage {
            prompt_tokens: token_count(response, "/usage/inputTokens"),
            completion_tokens: token_count(response, "/usage/outputTokens"),
            total_tokens: token_count(response, "/usage/totalTokens"),
        }
        .non_empty()
    }

    fn framing(&self) -> StreamFraming {
        StreamFraming::AwsEventStream
    }

    /// Payload of a `contentBlockDelta` event
    fn delta(&self, payload: &Value) -> Option<String> {
        payload
            .pointer("/delta/text")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn event_delta(&self, event_type: &str, payload: &Value) -> Option<String> {
        if event_type == "contentBlockDelta" {
            self.delta(payload)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loraix_core::types::ChatMessage;

    fn dialect(region: &str) -> Bedrock {
        Bedrock::new(region, AwsCredentials::new("AKID", "secret"))
    }

    #[test]
    fn test_endpoint() {
        let dialect = dialect("us-east-1");
        let base = dialect.default_base_url().unwrap();
        let req = ProviderRequest::new("anthropic.claude-3-haiku-20240307-v1:0", vec![]);
        assert_eq!(
            dialect.endpoint(&base, &req, true),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-haiku-20240307-v1%3A0/converse-stream"
        );
        assert_eq!(dialect.region(), "us-east-1");
    }

    #[test]
    fn test_rejects_api_key() {
        let dialect = dialect("us-east-1");
        assert!(dialect.check_api_key(None).is_ok());
        assert!(dialect
            .check_api_key(Some("key"))
            .unwrap_err()
            .contains("SigV4"));
    }

    #[test]
    fn test_body() {
        let req = ProviderRequest::new(
            "m",
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
        )
        .with_max_tokens(32);
        let body = dialect("us-west-2").body(&req, false);

        assert_eq!(
            body,
            json!({
                "messages": [{"role": "user", "content": [{"text": "hi"}]}],
                "system": [{"text": "sys"}],
                "inferenceConfig": {"maxTokens": 32}
            })
        );
    }

    #[test]
    fn test_parse_response() {
        let dialect = dialect("us-east-1");
        let response = json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "Hi"}]}},
            "usage": {"inputTokens": 3, "outputTokens": 1, "totalTokens": 4}
        });
        assert_eq!(dialect.text(&response), "Hi");
        assert_eq!(dialect.usage(&response).unwrap().total_tokens, Some(4));

        let delta = json!({"contentBlockIndex": 0, "delta": {"text": "x"}});
        assert_eq!(
            dialect.event_delta("contentBlockDelta", &delta),
            Some("x".to_string())
        );
        assert_eq!(dialect.event_delta("messageStart", &delta), None);
        assert_eq!(
            dialect.event_delta("contentBlockDelta", &json!({"delta": {"text": ""}})),
            None
        );
    }
}
