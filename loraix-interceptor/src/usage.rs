//! Usage accounting across concurrent calls.

use async_trait::async_trait;
use dashmap::DashMap;
use loraix_core::error::LoraixError;
use loraix_core::interceptor::{Interceptor, InterceptorPhase};
use loraix_core::types::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Tallies for one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    /// Successful calls answered by this provider
    pub calls: u64,
    /// Attempts dispatched to this provider, including failed ones
    pub attempts: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl ProviderUsage {
    fn record(&mut self, usage: &Usage) {
        self.prompt_tokens += u64::from(usage.prompt_tokens.unwrap_or(0));
        self.completion_tokens += u64::from(usage.completion_tokens.unwrap_or(0));
        self.total_tokens += u64::from(usage.total_tokens.unwrap_or(0));
    }
}

/// Point-in-time copy of a [`UsageTracker`], ordered by provider id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub providers: BTreeMap<String, ProviderUsage>,
}

impl UsageSnapshot {
    /// Sum over every provider
    pub fn total(&self) -> ProviderUsage {
        self.providers
            .values()
            .fold(ProviderUsage::default(), |mut acc, usage| {
                acc.calls += usage.calls;
                acc.attempts += usage.attempts;
                acc.prompt_tokens += usage.prompt_tokens;
                acc.completion_tokens += usage.completion_tokens;
                acc.total_tokens += usage.total_tokens;
                acc
            })
    }
}

/// Interceptor that counts attempts, successful calls and tokens per
/// provider.
///
/// Share one tracker between the runtime and the code reading it:
///
/// ```ignore
/// let usage = Arc::new(UsageTracker::new());
/// let runtime = Runtime::builder(provider)
///     .model("gpt-4o-mini")
///     .interceptor(usage.clone())
///     .finish()?;
///
/// runtime.generate("hi", CallOptions::new()).await?;
/// println!("{}", serde_json::to_string(&usage.snapshot())?);
/// ```
#[derive(Debug, Default)]
pub struct UsageTracker {
    providers: DashMap<String, ProviderUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tallies for one provider, if it has been seen
    pub fn provider(&self, id: &str) -> Option<ProviderUsage> {
        self.providers.get(id).map(|entry| *entry.value())
    }

    /// Copy of every provider's tallies
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            providers: self
                .providers
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect(),
        }
    }

    /// Forget everything counted so far
    pub fn reset(&self) {
        self.providers.clear();
    }
}

#[async_trait]
impl Interceptor for UsageTracker {
    fn name(&self) -> &str {
        "UsageTracker"
    }

    fn enforce(&self) -> InterceptorPhase {
        InterceptorPhase::Post
    }

    async fn on_attempt(&self, event: &AttemptEvent<'_>) -> Result<(), LoraixError> {
        self.providers
            .entry(event.provider.to_string())
            .or_default()
            .attempts += 1;
        Ok(())
    }

    async fn on_response(
        &self,
        response: &mut LoraixResponse,
        _ctx: &RequestContext,
    ) -> Result<(), LoraixError> {
        let mut entry = self.providers.entry(response.provider.clone()).or_default();
        entry.calls += 1;
        if let Some(usage) = &response.usage {
            entry.record(usage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn response(provider: &str, usage: Option<Usage>) -> LoraixResponse {
        LoraixResponse {
            text: String::new(),
            json: None,
            provider: provider.to_string(),
            model: "m".to_string(),
            usage,
            latency_ms: 0,
            attempts: 1,
            fallback_used: false,
            raw: serde_json::Value::Null,
        }
    }

    async fn attempt(tracker: &UsageTracker, provider: &str) {
        let ctx = RequestContext::new("m");
        let req = ProviderRequest::new("m", vec![]);
        tracker
            .on_attempt(&AttemptEvent {
                provider,
                attempt: 1,
                request: &req,
                context: &ctx,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_counts_attempts_and_tokens() {
        let tracker = UsageTracker::new();
        let ctx = RequestContext::new("m");

        attempt(&tracker, "openai").await;
        attempt(&tracker, "openai").await;
        attempt(&tracker, "anthropic").await;

        let usage = Usage {
            prompt_tokens: Some(10),
            completion_tokens: None,
            total_tokens: Some(15),
        };
        tracker
            .on_response(&mut response("anthropic", Some(usage)), &ctx)
            .await
            .unwrap();

        assert_eq!(tracker.provider("openai").unwrap().attempts, 2);
        assert_eq!(tracker.provider("openai").unwrap().calls, 0);
        assert_eq!(
            tracker.provider("anthropic").unwrap(),
            ProviderUsage {
                calls: 1,
                attempts: 1,
                prompt_tokens: 10,
                completion_tokens: 0,
                total_tokens: 15,
            }
        );
        assert!(tracker.provider("gemini").is_none());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.total().attempts, 3);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["providers"]["anthropic"]["total_tokens"], 15);

        tracker.reset();
        assert_eq!(tracker.snapshot(), UsageSnapshot::default());
    }

    #[tokio::test]
    async fn test_concurrent_updates() {
        let tracker = Arc::new(UsageTracker::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                let provider = if i % 2 == 0 { "a" } else { "b" };
                attempt(&tracker, provider).await;
                tracker
                    .on_response(
                        &mut response(provider, None),
                        &RequestContext::new("m"),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.providers["a"].calls, 16);
        assert_eq!(snapshot.providers["b"].attempts, 16);
        assert_eq!(snapshot.total().calls, 32);
    }
}
