//! Runtime configuration and its builder.

use crate::error::LoraixError;
use crate::interceptor::{Interceptor, InterceptorChain};
use crate::layer::Layer;
use crate::provider::Provider;
use crate::retry::{BackoffStrategy, ExponentialBackoff};
use crate::strategy::{JsonOutputStrategy, StrictJsonStrategy};
use std::sync::Arc;
use std::time::Duration;

use super::executor::Runtime;

/// Default retry budget per provider
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Read-only configuration shared by every call on a [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub fallback_providers: Vec<Arc<dyn Provider>>,
    /// Deadline per attempt, and per chunk while streaming
    pub timeout: Option<Duration>,
    pub backoff: Arc<dyn BackoffStrategy>,
    pub interceptors: InterceptorChain,
    pub json_strategy: Arc<dyn JsonOutputStrategy>,
}

impl RuntimeConfig {
    /// Create a configuration with default settings
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            max_retries: DEFAULT_MAX_RETRIES,
            fallback_providers: Vec::new(),
            timeout: None,
            backoff: Arc::new(ExponentialBackoff::new()),
            interceptors: InterceptorChain::default(),
            json_strategy: Arc::new(StrictJsonStrategy::new()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), LoraixError> {
        if self.model.trim().is_empty() {
            return Err(LoraixError::configuration("A model is required."));
        }
        Ok(())
    }
}

/// Builder for composing a [`Runtime`].
///
/// Layers wrap the primary provider with static dispatch while building;
/// everything is erased to `Arc<dyn Provider>` by [`RuntimeBuilder::finish`].
///
/// # Example
///
/// ```ignore
/// let runtime = Runtime::builder(openai)
///     .layer(LoggingLayer::new())
///     .model("gpt-4o-mini")
///     .fallback(anthropic)
///     .timeout(Duration::from_secs(30))
///     .interceptor(Arc::new(TracingInterceptor::new()))
///     .finish()?;
/// ```
pub struct RuntimeBuilder<P> {
    provider: P,
    model: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
    fallback_providers: Vec<Arc<dyn Provider>>,
    timeout: Option<Duration>,
    backoff: Arc<dyn BackoffStrategy>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    json_strategy: Arc<dyn JsonOutputStrategy>,
}

impl<P: Provider> RuntimeBuilder<P> {
    /// Create a new builder with a primary provider
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            model: None,
            temperature: 0.0,
            max_tokens: None,
            max_retries: DEFAULT_MAX_RETRIES,
            fallback_providers: Vec::new(),
            timeout: None,
            backoff: Arc::new(ExponentialBackoff::new()),
            interceptors: Vec::new(),
            json_strategy: Arc::new(StrictJsonStrategy::new()),
        }
    }

    /// Add a layer to wrap the primary provider
    ///
    /// Each call to `layer()` creates a new concrete type by wrapping the
    /// previous provider.
    pub fn layer<L>(self, layer: L) -> RuntimeBuilder<L::LayeredProvider>
    where
        L: Layer<P>,
    {
        RuntimeBuilder {
            provider: layer.layer(self.provider),
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            fallback_providers: self.fallback_providers,
            timeout: self.timeout,
            backoff: self.backoff,
            interceptors: self.interceptors,
            json_strategy: self.json_strategy,
        }
    }

    /// Set the default model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the default temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the retry budget per provider
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Append a provider to the fallback chain
    pub fn fallback(mut self, provider: impl Provider) -> Self {
        self.fallback_providers.push(Arc::new(provider));
        self
    }

    /// Append an already shared provider to the fallback chain
    pub fn fallback_arc(mut self, provider: Arc<dyn Provider>) -> Self {
        self.fallback_providers.push(provider);
        self
    }

    /// Set the per-attempt and per-chunk timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a custom backoff strategy
    pub fn backoff(mut self, backoff: Arc<dyn BackoffStrategy>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Add an interceptor
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Set the JSON output strategy used by `json()`
    pub fn json_strategy(mut self, strategy: Arc<dyn JsonOutputStrategy>) -> Self {
        self.json_strategy = strategy;
        self
    }

    /// Finish building and create a Runtime
    pub fn finish(self) -> Result<Runtime, LoraixError> {
        let model = self
            .model
            .ok_or_else(|| LoraixError::configuration("A model is required."))?;

        Runtime::new(RuntimeConfig {
            provider: Arc::new(self.provider),
            model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
            fallback_providers: self.fallback_providers,
            timeout: self.timeout,
            backoff: self.backoff,
            interceptors: InterceptorChain::new(self.interceptors),
            json_strategy: self.json_strategy,
        })
    }
}
