//! Structured logging around every logical call.

use async_trait::async_trait;
use loraix_core::error::LoraixError;
use loraix_core::interceptor::{Interceptor, InterceptorPhase};
use loraix_core::types::*;

/// Emits `tracing` events for each call, attempt and response.
///
/// Runs in the `Post` phase so it sees the request after other
/// interceptors have rewritten it.
#[derive(Debug, Clone, Default)]
pub struct TracingInterceptor {
    include_content: bool,
}

impl TracingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log message and response text at `TRACE` level
    pub fn with_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }
}

#[async_trait]
impl Interceptor for TracingInterceptor {
    fn name(&self) -> &str {
        "TracingInterceptor"
    }

    fn enforce(&self) -> InterceptorPhase {
        InterceptorPhase::Post
    }

    async fn on_request(
        &self,
        req: &mut ProviderRequest,
        ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        tracing::debug!(
            request_id = %ctx.request_id,
            model = %req.model,
            messages = req.messages.len(),
            temperature = ?req.temperature,
            max_tokens = ?req.max_tokens,
            "llm call started"
        );
        if self.include_content {
            for message in &req.messages {
                tracing::trace!(
                    request_id = %ctx.request_id,
                    role = message.role.as_str(),
                    content = %message.content,
                    "llm message"
                );
            }
        }
        Ok(())
    }

    async fn on_attempt(&self, event: &AttemptEvent<'_>) -> Result<(), LoraixError> {
        tracing::debug!(
            request_id = %event.context.request_id,
            provider = event.provider,
            attempt = event.attempt,
            "llm attempt"
        );
        Ok(())
    }

    async fn on_response(
        &self,
        response: &mut LoraixResponse,
        ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        tracing::info!(
            request_id = %ctx.request_id,
            provider = %response.provider,
            model = %response.model,
            attempts = response.attempts,
            fallback_used = response.fallback_used,
            latency_ms = response.latency_ms,
            total_tokens = ?response.usage.and_then(|u| u.total_tokens),
            "llm call finished"
        );
        if self.include_content {
            tracing::trace!(request_id = %ctx.request_id, text = %response.text, "llm response");
        }
        Ok(())
    }
}
