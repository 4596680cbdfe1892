//! Generic HTTP chat provider.
//!
//! One adapter type covers every vendor: the [`ChatDialect`] supplies the
//! endpoint, credentials and JSON shapes, while this module owns the
//! transport. Each `generate` or `stream` call issues exactly one HTTP
//! request and never retries on its own.

use crate::dialect::{ChatDialect, StreamFraming};
use crate::stream::{event_stream_deltas, sse_deltas};
use async_trait::async_trait;
use loraix_core::error::LoraixError;
use loraix_core::provider::{Provider, TextStream};
use loraix_core::types::*;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Provider speaking a vendor chat API over HTTP
#[derive(Clone)]
pub struct HttpChatProvider<D> {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    headers: HeaderMap,
    dialect: Arc<D>,
    info: Arc<ProviderInfo>,
}

impl<D: ChatDialect> std::fmt::Debug for HttpChatProvider<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatProvider")
            .field("info", &self.info)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl<D: ChatDialect> HttpChatProvider<D> {
    /// Create a builder for `dialect`
    pub fn builder(dialect: D) -> HttpChatBuilder<D> {
        HttpChatBuilder::new(dialect)
    }

    /// The vendor dialect
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        req: &ProviderRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, LoraixError> {
        let url = self.dialect.endpoint(&self.base_url, req, stream);
        tracing::debug!(
            provider = %self.info.id,
            url = %url,
            model = %req.model,
            stream,
            "sending chat request"
        );

        let builder = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&self.dialect.body(req, stream));
        let mut request = self
            .dialect
            .authorize(builder, self.api_key.as_deref())
            .build()?;
        self.dialect.sign(&mut request)?;

        let response = cancellable(cancel, self.client.execute(request)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = cancellable(cancel, response.text())
                .await
                .unwrap_or_default();
            return Err(LoraixError::status(
                self.info.id.clone(),
                status.as_u16(),
                body,
            ));
        }

        Ok(response)
    }
}

/// Race a transport future against the attempt's cancellation token
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, reqwest::Error>>,
) -> Result<T, LoraixError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoraixError::cancelled("Request was aborted.")),
        result = fut => result.map_err(LoraixError::from),
    }
}

#[async_trait]
impl<D: ChatDialect> Provider for HttpChatProvider<D> {
    fn info(&self) -> Arc<ProviderInfo> {
        self.info.clone()
    }

    async fn generate(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<ProviderResult, LoraixError> {
        let response = self.send(&req, false, &ctx.cancel).await?;
        let raw: Value = cancellable(&ctx.cancel, response.json()).await?;

        Ok(ProviderResult {
            text: self.dialect.text(&raw),
            usage: self.dialect.usage(&raw),
            raw,
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn stream(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<TextStream, LoraixError> {
        let response = self.send(&req, true, &ctx.cancel).await?;

        Ok(match self.dialect.framing() {
            StreamFraming::Sse => sse_deltas(response, self.dialect.clone(), ctx.cancel),
            StreamFraming::AwsEventStream => {
                event_stream_deltas(response.bytes_stream(), self.dialect.clone(), ctx.cancel)
            }
        })
    }
}

/// Builder for [`HttpChatProvider`]
pub struct HttpChatBuilder<D> {
    dialect: D,
    api_key: Option<String>,
    api_base: Option<String>,
    client: Option<reqwest::Client>,
    headers: Vec<(String, String)>,
}

impl<D: ChatDialect> HttpChatBuilder<D> {
    /// Create a builder for `dialect`
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            api_key: None,
            api_base: None,
            client: None,
            headers: Vec::new(),
        }
    }

    /// Set API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set API base URL (for proxies and OpenAI-compatible APIs)
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Use a preconfigured HTTP client
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Send an extra header with every request
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the provider with the dialect's default id and name
    pub fn build(self) -> Result<HttpChatProvider<D>, LoraixError> {
        let id = self.dialect.id().to_string();
        let name = self.dialect.name().to_string();
        self.build_with_id(id, name)
    }

    /// Build a provider with a custom provider ID and name
    ///
    /// This is useful when several providers share a dialect, for example
    /// two OpenAI-compatible gateways in one fallback chain.
    pub fn build_with_id(
        self,
        provider_id: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Result<HttpChatProvider<D>, LoraixError> {
        let name = provider_name.into();

        let api_key = self.api_key.filter(|k| !k.is_empty());
        self.dialect
            .check_api_key(api_key.as_deref())
            .map_err(|reason| LoraixError::configuration(format!("{} {}", name, reason)))?;

        let base_url = self
            .api_base
            .or_else(|| self.dialect.default_base_url())
            .ok_or_else(|| LoraixError::configuration(format!("{} requires a base URL.", name)))?;
        if !base_url.starts_with("http") {
            return Err(LoraixError::configuration(format!(
                "{} requires a valid base URL, got {:?}.",
                name, base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (key, value) in self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                LoraixError::configuration(format!("Invalid header name {:?}: {}", key, e))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                LoraixError::configuration(format!("Invalid value for header {:?}: {}", key, e))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(HttpChatProvider {
            client: self.client.unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            headers,
            dialect: Arc::new(self.dialect),
            info: Arc::new(ProviderInfo::new(provider_id, name)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Anthropic, AzureOpenAi, Bedrock, Gemini, OpenAiCompatible};
    use crate::sigv4::AwsCredentials;
    use crate::stream::{encode_event, AWS_EVENT_STREAM};
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{
        body_partial_json, header, header_exists, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> AttemptContext {
        AttemptContext::new(1, None)
    }

    fn request(model: &str) -> ProviderRequest {
        ProviderRequest::new(model, vec![ChatMessage::user("hi")])
    }

    async fn collect(stream: TextStream) -> Vec<String> {
        stream.map(|chunk| chunk.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_openai_generate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(OpenAiCompatible::openai())
            .api_key("sk-test")
            .api_base(format!("{}/v1", server.uri()))
            .build()
            .unwrap();

        let result = provider
            .generate(request("gpt-4o-mini"), ctx())
            .await
            .unwrap();

        assert_eq!(result.text, "Hello!");
        assert_eq!(result.usage.unwrap().total_tokens, Some(7));
        assert_eq!(result.raw["choices"][0]["message"]["role"], "assistant");
        assert_eq!(provider.info().id, "openai");
    }

    #[tokio::test]
    async fn test_error_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(OpenAiCompatible::deepseek())
            .api_key("k")
            .api_base(server.uri())
            .build()
            .unwrap();

        let err = provider.generate(request("m"), ctx()).await.unwrap_err();

        assert_eq!(err.status_code(), Some(429));
        assert!(err.is_retryable());
        assert!(matches!(err, LoraixError::Status { ref provider, ref body, .. }
            if provider == "deepseek" && body == "slow down"));
    }

    #[tokio::test]
    async fn test_cancelled_attempt_aborts_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(OpenAiCompatible::openai())
            .api_key("k")
            .api_base(server.uri())
            .build()
            .unwrap();

        let ctx = ctx();
        ctx.cancel.cancel();
        let err = provider.generate(request("m"), ctx).await.unwrap_err();

        assert!(matches!(err, LoraixError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_anthropic_headers_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "ak"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({"max_tokens": 1024})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Hi"}],
                "usage": {"input_tokens": 3, "output_tokens": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(Anthropic::new())
            .api_key("ak")
            .api_base(server.uri())
            .build()
            .unwrap();

        let result = provider.generate(request("claude"), ctx()).await.unwrap();
        assert_eq!(result.text, "Hi");
        assert_eq!(result.usage.unwrap().total_tokens, Some(4));
    }

    #[tokio::test]
    async fn test_gemini_key_in_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Hi"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(Gemini::new())
            .api_key("g-key")
            .api_base(format!("{}/v1beta/", server.uri()))
            .build()
            .unwrap();

        let result = provider
            .generate(request("gemini-1.5-flash"), ctx())
            .await
            .unwrap();
        assert_eq!(result.text, "Hi");
        assert!(result.usage.is_none());
    }

    #[tokio::test]
    async fn test_azure_deployment_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/prod-4o/chat/completions"))
            .and(query_param("api-version", "2024-10-21"))
            .and(header("api-key", "az"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(AzureOpenAi::new("prod-4o"))
            .api_key("az")
            .api_base(server.uri())
            .build()
            .unwrap();

        let result = provider.generate(request("gpt-4o"), ctx()).await.unwrap();
        assert_eq!(result.text, "ok");
    }

    #[tokio::test]
    async fn test_openai_sse_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\r\n\r\n",
            "data: not json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(OpenAiCompatible::grok())
            .api_key("xai")
            .api_base(server.uri())
            .build()
            .unwrap();

        let stream = provider.stream(request("grok-2"), ctx()).await.unwrap();
        assert_eq!(collect(stream).await, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_anthropic_event_stream() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\" there\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(Anthropic::new())
            .api_key("ak")
            .api_base(server.uri())
            .build()
            .unwrap();

        let stream = provider.stream(request("claude"), ctx()).await.unwrap();
        assert_eq!(collect(stream).await, vec!["Hi", " there"]);
    }

    #[tokio::test]
    async fn test_stream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(Gemini::new())
            .api_key("g")
            .api_base(server.uri())
            .build()
            .unwrap();

        let err = provider.stream(request("m"), ctx()).await.err().unwrap();
        assert_eq!(err.status_code(), Some(503));
    }

    fn aws_credentials() -> AwsCredentials {
        AwsCredentials::new("AKIDEXAMPLE", "secret").with_session_token("session")
    }

    fn sigv4_signed(req: &wiremock::Request) -> bool {
        req.headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| {
                v.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/")
                    && v.contains("/us-east-1/bedrock/aws4_request")
            })
    }

    #[tokio::test]
    async fn test_bedrock_event_stream() {
        let server = MockServer::start().await;
        let body = [
            encode_event("messageStart", &json!({"role": "assistant"})),
            encode_event(
                "contentBlockDelta",
                &json!({"contentBlockIndex": 0, "delta": {"text": "Hel"}}),
            ),
            encode_event(
                "contentBlockDelta",
                &json!({"contentBlockIndex": 0, "delta": {"text": "lo"}}),
            ),
            encode_event("messageStop", &json!({"stopReason": "end_turn"})),
        ]
        .concat();
        Mock::given(method("POST"))
            .and(path("/model/amazon.nova-lite-v1%3A0/converse-stream"))
            .and(sigv4_signed)
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, AWS_EVENT_STREAM))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(Bedrock::new("us-east-1", aws_credentials()))
            .api_base(server.uri())
            .build()
            .unwrap();

        let stream = provider
            .stream(request("amazon.nova-lite-v1:0"), ctx())
            .await
            .unwrap();
        assert_eq!(collect(stream).await, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_bedrock_requests_are_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/m/converse"))
            .and(header("x-amz-security-token", "session"))
            .and(header_exists("x-amz-date"))
            .and(sigv4_signed)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": {"message": {"content": [{"text": "ok"}]}},
                "usage": {"inputTokens": 1, "outputTokens": 1, "totalTokens": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpChatProvider::builder(Bedrock::new("us-east-1", aws_credentials()))
            .api_base(server.uri())
            .build()
            .unwrap();

        let result = provider.generate(request("m"), ctx()).await.unwrap();
        assert_eq!(result.text, "ok");
        assert_eq!(result.usage.unwrap().total_tokens, Some(2));
    }

    #[test]
    fn test_bedrock_rejects_api_key() {
        let err = HttpChatProvider::builder(Bedrock::new("us-east-1", aws_credentials()))
            .api_key("br-token")
            .build()
            .unwrap_err();

        assert!(matches!(err, LoraixError::Configuration(_)));
        assert!(err.to_string().contains("does not accept an API key"));
    }

    #[test]
    fn test_builder_validation() {
        let err = HttpChatProvider::builder(OpenAiCompatible::openai())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("requires an API key"));

        let err = HttpChatProvider::builder(OpenAiCompatible::openai())
            .api_key("")
            .build()
            .unwrap_err();
        assert!(matches!(err, LoraixError::Configuration(_)));

        let err = HttpChatProvider::builder(OpenAiCompatible::openai())
            .api_key("k")
            .api_base("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, LoraixError::Configuration(_)));

        let err = HttpChatProvider::builder(AzureOpenAi::new("d"))
            .api_key("k")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("requires a base URL"));

        let err = HttpChatProvider::builder(OpenAiCompatible::openai())
            .api_key("k")
            .header("bad header", "v")
            .build()
            .unwrap_err();
        assert!(matches!(err, LoraixError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = HttpChatProvider::builder(OpenAiCompatible::openai())
            .api_key("sk-very-secret")
            .build_with_id("gateway", "Gateway")
            .unwrap();

        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(provider.info().id, "gateway");
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");
    }
}
