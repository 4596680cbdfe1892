//! Runtime implementation.
//!
//! The runtime drives the attempt/retry/fallback state machine for every
//! logical call: providers are tried strictly in order, each one gets its
//! own retry budget, and the first success wins.

use crate::error::LoraixError;
use crate::provider::{Provider, TextStream};
use crate::retry::RetryPolicy;
use crate::timeout::{with_deadline, with_stream_deadline};
use crate::types::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::{RuntimeBuilder, RuntimeConfig};

/// Multi-provider runtime.
///
/// Holds read-only configuration only, so one instance can serve concurrent
/// callers without locking. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: Arc<RuntimeConfig>,
}

/// Settings resolved from runtime defaults and per-call overrides
struct CallPlan {
    providers: Vec<Arc<dyn Provider>>,
    policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl Runtime {
    /// Create a runtime from a configuration
    pub fn new(config: RuntimeConfig) -> Result<Self, LoraixError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Create a new builder
    pub fn builder<P: Provider>(provider: P) -> RuntimeBuilder<P> {
        RuntimeBuilder::new(provider)
    }

    /// Get the runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get primary provider information
    pub fn info(&self) -> Arc<ProviderInfo> {
        self.config.provider.info()
    }

    /// Generate a completion.
    ///
    /// Tries the primary provider, then each fallback, until one succeeds.
    /// If every provider exhausts its retries, the most recent error is
    /// returned.
    pub async fn generate(
        &self,
        input: impl Into<Input>,
        options: CallOptions,
    ) -> Result<LoraixResponse, LoraixError> {
        let mut req = self.build_request(input.into().into_messages(), &options);
        let ctx = RequestContext::new(req.model.clone());

        self.config.interceptors.on_request(&mut req, &ctx).await?;

        self.run_with_providers(req, &options, &ctx).await
    }

    /// Generate JSON output checked against a shallow schema.
    ///
    /// Parse or schema failures repeat the whole `generate` call once; a
    /// second failure raises [`LoraixError::JsonValidation`]. Transport
    /// errors from `generate` propagate immediately.
    pub async fn json(&self, request: JsonRequest) -> Result<LoraixResponse, LoraixError> {
        let JsonRequest {
            input,
            schema,
            options,
        } = request;

        let mut messages = input.into_messages();
        self.config.json_strategy.apply(&mut messages, &schema);

        let mut last_error = None;
        for round in 1..=2 {
            let mut response = self
                .generate(Input::Messages(messages.clone()), options.clone())
                .await?;

            let parsed = serde_json::from_str::<serde_json::Value>(&response.text)
                .map_err(LoraixError::from)
                .and_then(|value| {
                    if schema.validate(&value) {
                        Ok(value)
                    } else {
                        Err(LoraixError::json_validation(
                            "JSON does not match provided schema.",
                        ))
                    }
                });

            match parsed {
                Ok(value) => {
                    response.json = Some(value);
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(round, error = %e, "structured output rejected");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(cause) => {
                LoraixError::json_validation_caused_by("Unable to produce valid JSON output.", cause)
            }
            None => LoraixError::json_validation("Unable to produce valid JSON output."),
        })
    }

    /// Open a text stream.
    ///
    /// Establishing the stream goes through the same retry and fallback
    /// loop as [`Runtime::generate`]; fallbacks that cannot stream are
    /// skipped. Once established, every chunk must arrive within the
    /// configured timeout of the previous one, otherwise the stream is
    /// dropped and a timeout error is yielded. Chunks already delivered are
    /// not replayed.
    pub async fn stream(
        &self,
        input: impl Into<Input>,
        options: CallOptions,
    ) -> Result<TextStream, LoraixError> {
        let primary = options
            .provider
            .clone()
            .unwrap_or_else(|| self.config.provider.clone());
        if !primary.supports_streaming() {
            return Err(crate::provider::unsupported_stream(&primary.info().id));
        }

        let mut req = self.build_request(input.into().into_messages(), &options);
        let ctx = RequestContext::new(req.model.clone());

        self.config.interceptors.on_request(&mut req, &ctx).await?;

        let plan = self.plan(&options);
        let mut attempts = 0;
        let mut last_error = None;

        for provider in &plan.providers {
            if !provider.supports_streaming() {
                tracing::debug!(
                    provider = %provider.info().id,
                    "skipping fallback without streaming support"
                );
                continue;
            }

            let outcome = self
                .try_provider(provider, &req, &ctx, &plan, &mut attempts, |actx| {
                    let cancel = actx.cancel.clone();
                    let opened = provider.stream(req.clone(), actx);
                    async move { opened.await.map(|stream| (stream, cancel)) }
                })
                .await?;

            match outcome {
                Ok((stream, cancel)) => {
                    tracing::debug!(
                        provider = %provider.info().id,
                        request_id = %ctx.request_id,
                        attempts,
                        "stream established"
                    );
                    return Ok(with_stream_deadline(stream, plan.timeout, cancel));
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider.info().id,
                        error = %e,
                        "provider exhausted while opening stream"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LoraixError::other("Execution failed with no provider error.")))
    }

    fn build_request(&self, messages: Vec<ChatMessage>, options: &CallOptions) -> ProviderRequest {
        ProviderRequest {
            messages,
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
            max_tokens: options.max_tokens.or(self.config.max_tokens),
        }
    }

    fn plan(&self, options: &CallOptions) -> CallPlan {
        let primary = options
            .provider
            .clone()
            .unwrap_or_else(|| self.config.provider.clone());
        let fallbacks = options
            .fallback_providers
            .clone()
            .unwrap_or_else(|| self.config.fallback_providers.clone());

        let mut providers = Vec::with_capacity(fallbacks.len() + 1);
        providers.push(primary);
        providers.extend(fallbacks);

        CallPlan {
            providers,
            policy: RetryPolicy::new(
                options.max_retries.unwrap_or(self.config.max_retries),
                self.config.backoff.clone(),
            ),
            timeout: options.timeout.or(self.config.timeout),
        }
    }

    async fn run_with_providers(
        &self,
        req: ProviderRequest,
        options: &CallOptions,
        ctx: &RequestContext,
    ) -> Result<LoraixResponse, LoraixError> {
        let plan = self.plan(options);
        let start = Instant::now();
        let mut attempts = 0;
        let mut last_error = None;

        for (index, provider) in plan.providers.iter().enumerate() {
            let outcome = self
                .try_provider(provider, &req, ctx, &plan, &mut attempts, |actx| {
                    provider.generate(req.clone(), actx)
                })
                .await?;

            match outcome {
                Ok(out) => {
                    let mut response = LoraixResponse {
                        text: out.text,
                        json: None,
                        provider: provider.info().id.clone(),
                        model: req.model.clone(),
                        usage: out.usage,
                        latency_ms: start.elapsed().as_millis() as u64,
                        attempts,
                        fallback_used: index > 0,
                        raw: out.raw,
                    };

                    self.config
                        .interceptors
                        .on_response(&mut response, ctx)
                        .await?;

                    return Ok(response);
                }
                Err(e) => {
                    if index + 1 < plan.providers.len() {
                        tracing::warn!(
                            provider = %provider.info().id,
                            error = %e,
                            "provider exhausted, trying next fallback"
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LoraixError::other("Execution failed with no provider error.")))
    }

    /// Run the retry loop against one provider.
    ///
    /// The outer error aborts the whole call (interceptor failures); the
    /// inner result is the provider's outcome once its budget is spent.
    async fn try_provider<T, F, Fut>(
        &self,
        provider: &Arc<dyn Provider>,
        req: &ProviderRequest,
        ctx: &RequestContext,
        plan: &CallPlan,
        attempts: &mut u32,
        mut call: F,
    ) -> Result<Result<T, LoraixError>, LoraixError>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, LoraixError>>,
    {
        let info = provider.info();
        let mut attempt = 0;

        loop {
            attempt += 1;
            *attempts += 1;

            self.config
                .interceptors
                .on_attempt(&AttemptEvent {
                    provider: &info.id,
                    attempt,
                    request: req,
                    context: ctx,
                })
                .await?;

            tracing::debug!(
                provider = %info.id,
                attempt,
                request_id = %ctx.request_id,
                "dispatching attempt"
            );

            let actx = AttemptContext::new(attempt, plan.timeout);
            let cancel: CancellationToken = actx.cancel.clone();

            match with_deadline(call(actx), plan.timeout, &cancel).await {
                Ok(out) => return Ok(Ok(out)),
                Err(e) => {
                    if !plan.policy.pause_before_retry(attempt, &e).await {
                        return Ok(Err(e));
                    }
                }
            }
        }
    }
}

/// Build a one-shot runtime from `config` and run a single call.
pub async fn generate(
    input: impl Into<Input>,
    options: CallOptions,
    config: RuntimeConfig,
) -> Result<LoraixResponse, LoraixError> {
    Runtime::new(config)?.generate(input, options).await
}
