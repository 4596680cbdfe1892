//! Interceptor hooks fired around every logical call.

use crate::error::LoraixError;
use crate::types::*;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Interceptor execution phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorPhase {
    /// Execute before normal interceptors
    Pre,
    /// Execute in normal order
    Normal,
    /// Execute after normal interceptors
    Post,
}

/// Observation/mutation hooks around a call.
///
/// Hooks run sequentially and are awaited. An error returned from any hook
/// aborts the call and is surfaced to the caller unchanged.
#[async_trait]
pub trait Interceptor: Send + Sync + Debug + 'static {
    /// Interceptor name
    fn name(&self) -> &str;

    /// Interceptor execution phase
    fn enforce(&self) -> InterceptorPhase {
        InterceptorPhase::Normal
    }

    /// Fired once per call after the request is built; may mutate it
    async fn on_request(
        &self,
        _req: &mut ProviderRequest,
        _ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        Ok(())
    }

    /// Fired before every attempt against a provider
    async fn on_attempt(&self, _event: &AttemptEvent<'_>) -> Result<(), LoraixError> {
        Ok(())
    }

    /// Fired once with the successful response before it is returned
    async fn on_response(
        &self,
        _response: &mut LoraixResponse,
        _ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        Ok(())
    }
}

/// Ordered set of interceptors, fixed at construction.
#[derive(Debug, Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Create a chain; interceptors are stably sorted by phase
    pub fn new(mut interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        interceptors.sort_by_key(|i| match i.enforce() {
            InterceptorPhase::Pre => 0,
            InterceptorPhase::Normal => 1,
            InterceptorPhase::Post => 2,
        });

        Self { interceptors }
    }

    /// Get all interceptors
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Whether the chain has no interceptors
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run request hooks in order
    pub async fn on_request(
        &self,
        req: &mut ProviderRequest,
        ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        for interceptor in &self.interceptors {
            interceptor.on_request(req, ctx).await?;
        }
        Ok(())
    }

    /// Run attempt hooks in order
    pub async fn on_attempt(&self, event: &AttemptEvent<'_>) -> Result<(), LoraixError> {
        for interceptor in &self.interceptors {
            interceptor.on_attempt(event).await?;
        }
        Ok(())
    }

    /// Run response hooks in order
    pub async fn on_response(
        &self,
        response: &mut LoraixResponse,
        ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        for interceptor in &self.interceptors {
            interceptor.on_response(response, ctx).await?;
        }
        Ok(())
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
