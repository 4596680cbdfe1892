//! Provider trait and core abstractions.

use crate::error::LoraixError;
use crate::types::*;
use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;

/// Stream of incremental text deltas
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LoraixError>> + Send>>;

/// Core provider trait for vendor adapters.
///
/// A provider issues exactly one vendor call per `generate` invocation;
/// retrying and falling back are the runtime's job. Streaming is an
/// optional capability advertised through [`Provider::supports_streaming`].
#[async_trait]
pub trait Provider: Send + Sync + Debug + 'static {
    /// Get provider information
    fn info(&self) -> Arc<ProviderInfo>;

    /// Single non-streaming chat call.
    ///
    /// Implementations must abort the underlying transport when
    /// `ctx.cancel` fires and must report non-success HTTP statuses as
    /// [`LoraixError::Status`].
    async fn generate(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<ProviderResult, LoraixError>;

    /// Whether [`Provider::stream`] is implemented
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Open an incremental text stream.
    ///
    /// Dropping the returned stream must release the underlying transport.
    async fn stream(
        &self,
        _req: ProviderRequest,
        _ctx: AttemptContext,
    ) -> Result<TextStream, LoraixError> {
        Err(unsupported_stream(&self.info().id))
    }
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn info(&self) -> Arc<ProviderInfo> {
        (**self).info()
    }

    async fn generate(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<ProviderResult, LoraixError> {
        (**self).generate(req, ctx).await
    }

    fn supports_streaming(&self) -> bool {
        (**self).supports_streaming()
    }

    async fn stream(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<TextStream, LoraixError> {
        (**self).stream(req, ctx).await
    }
}

/// Error raised when streaming is requested from a provider without the capability
pub fn unsupported_stream(provider: &str) -> LoraixError {
    LoraixError::unsupported(format!("Provider {} does not support streaming.", provider))
}

/// Helper function to collect a text stream into a single string
pub async fn collect_text_stream(mut stream: TextStream) -> Result<String, LoraixError> {
    use futures::StreamExt;

    let mut content = String::new();
    while let Some(chunk) = stream.next().await {
        content.push_str(&chunk?);
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn info(&self) -> Arc<ProviderInfo> {
            Arc::new(ProviderInfo::new("echo", "Echo"))
        }

        async fn generate(
            &self,
            req: ProviderRequest,
            _ctx: AttemptContext,
        ) -> Result<ProviderResult, LoraixError> {
            Ok(ProviderResult {
                text: req.messages[0].content.clone(),
                usage: None,
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn test_stream_defaults_to_unsupported() {
        let provider = Echo;
        assert!(!provider.supports_streaming());

        let err = provider
            .stream(
                ProviderRequest::new("m", vec![ChatMessage::user("hi")]),
                AttemptContext::new(1, None),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LoraixError::Unsupported(_)));
        assert!(err.to_string().contains("echo"));
    }

    #[tokio::test]
    async fn test_arc_forwards() {
        let provider: Arc<dyn Provider> = Arc::new(Echo);
        let out = provider
            .generate(
                ProviderRequest::new("m", vec![ChatMessage::user("ping")]),
                AttemptContext::new(1, None),
            )
            .await
            .unwrap();
        assert_eq!(out.text, "ping");
        assert_eq!(provider.info().id, "echo");
    }

    #[tokio::test]
    async fn test_collect_text_stream() {
        let stream: TextStream = Box::pin(futures::stream::iter(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
        ]));
        assert_eq!(collect_text_stream(stream).await.unwrap(), "Hello");
    }
}
