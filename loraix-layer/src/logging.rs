//! Logging layer for provider operations.

use futures::StreamExt;
use loraix_core::error::LoraixError;
use loraix_core::layer::{Layer, LayeredProvider};
use loraix_core::provider::{Provider, TextStream};
use loraix_core::types::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Logging layer that logs provider operations.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self {
            prefix: "[loraix]".to_string(),
        }
    }

    /// Create a logging layer with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Provider> Layer<P> for LoggingLayer {
    type LayeredProvider = LoggingProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        LoggingProvider {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Provider wrapped with logging
#[derive(Debug)]
pub struct LoggingProvider<P> {
    inner: P,
    prefix: String,
}

#[async_trait]
impl<P: Provider> LayeredProvider for LoggingProvider<P> {
    type Inner = P;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_generate(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<ProviderResult, LoraixError> {
        let provider = self.inner.info().id.clone();
        tracing::debug!(
            "{} generate request: provider={}, model={}, messages={}, attempt={}",
            self.prefix,
            provider,
            req.model,
            req.messages.len(),
            ctx.attempt
        );

        let start = Instant::now();
        let result = self.inner.generate(req, ctx).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(output) => {
                tracing::debug!(
                    "{} generate success: provider={}, chars={}, tokens={:?}, elapsed={:?}",
                    self.prefix,
                    provider,
                    output.text.len(),
                    output.usage.and_then(|u| u.total_tokens),
                    elapsed
                );
            }
            Err(e) => {
                tracing::error!(
                    "{} generate error: provider={}, status={:?}, error={}, elapsed={:?}",
                    self.prefix,
                    provider,
                    e.status_code(),
                    e,
                    elapsed
                );
            }
        }

        result
    }

    async fn layered_stream(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<TextStream, LoraixError> {
        let provider = self.inner.info().id.clone();
        tracing::debug!(
            "{} stream request: provider={}, model={}, messages={}, attempt={}",
            self.prefix,
            provider,
            req.model,
            req.messages.len(),
            ctx.attempt
        );

        let start = Instant::now();
        let result = self.inner.stream(req, ctx).await;
        let elapsed = start.elapsed();

        match result {
            Ok(stream) => {
                tracing::debug!(
                    "{} stream opened: provider={}, elapsed={:?}",
                    self.prefix,
                    provider,
                    elapsed
                );

                let prefix = self.prefix.clone();
                let logged = stream.inspect(move |chunk| {
                    if let Err(e) = chunk {
                        tracing::error!(
                            "{} stream chunk error: provider={}, error={}",
                            prefix,
                            provider,
                            e
                        );
                    }
                });
                Ok(Box::pin(logged))
            }
            Err(e) => {
                tracing::error!(
                    "{} stream error: provider={}, error={}, elapsed={:?}",
                    self.prefix,
                    provider,
                    e,
                    elapsed
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<P: Provider> Provider for LoggingProvider<P> {
    fn info(&self) -> Arc<ProviderInfo> {
        LayeredProvider::layered_info(self)
    }

    async fn generate(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<ProviderResult, LoraixError> {
        LayeredProvider::layered_generate(self, req, ctx).await
    }

    fn supports_streaming(&self) -> bool {
        LayeredProvider::layered_supports_streaming(self)
    }

    async fn stream(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<TextStream, LoraixError> {
        LayeredProvider::layered_stream(self, req, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loraix_core::provider::collect_text_stream;

    #[derive(Debug)]
    struct Echo {
        fail: bool,
    }

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
            if self.fail {
                return Err(LoraixError::status("echo", 500, "boom"));
            }
            Ok(ProviderResult {
                text: req.messages[0].content.clone(),
                usage: None,
                raw: serde_json::Value::Null,
            })
        }

        fn supports_streaming(&self) -> bool {
            true
        }

        async fn stream(
            &self,
            _req: ProviderRequest,
            _ctx: AttemptContext,
        ) -> Result<TextStream, LoraixError> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok("a".to_string()),
                Err(LoraixError::stream("cut")),
            ])))
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("m", vec![ChatMessage::user("ping")])
    }

    #[tokio::test]
    async fn test_logging_provider_forwards() {
        let provider = LoggingLayer::new().layer(Echo { fail: false });

        assert_eq!(provider.info().id, "echo");
        assert!(provider.supports_streaming());

        let out = provider
            .generate(request(), AttemptContext::new(1, None))
            .await
            .unwrap();
        assert_eq!(out.text, "ping");
    }

    #[tokio::test]
    async fn test_logging_provider_passes_errors_through() {
        let provider = LoggingLayer::with_prefix("[test]").layer(Echo { fail: true });

        let err = provider
            .generate(request(), AttemptContext::new(1, None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));

        let stream = provider
            .stream(request(), AttemptContext::new(1, None))
            .await
            .unwrap();
        let err = collect_text_stream(stream).await.unwrap_err();
        assert!(matches!(err, LoraixError::Stream(_)));
    }
}
