//! Layer trait and abstractions.
//!
//! Layers wrap a provider with cross-cutting concerns such as logging.
//! They compose statically while the runtime is being built and are erased
//! to a single `Arc<dyn Provider>` once it is finished.

use crate::error::LoraixError;
use crate::provider::{Provider, TextStream};
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Layer trait for wrapping providers.
pub trait Layer<P: Provider> {
    /// The type of the layered provider
    type LayeredProvider: Provider;

    /// Wrap the inner provider with this layer
    fn layer(&self, inner: P) -> Self::LayeredProvider;
}

/// Helper trait for layered providers.
///
/// Provides default forwarding implementations for provider methods.
/// Implementers only override the methods they want to intercept.
#[async_trait]
pub trait LayeredProvider: Sized + Provider {
    /// The inner provider type
    type Inner: Provider;

    /// Get a reference to the inner provider
    fn inner(&self) -> &Self::Inner;

    /// Default implementation for info - forwards to inner
    fn layered_info(&self) -> Arc<ProviderInfo> {
        self.inner().info()
    }

    /// Default implementation for generate - forwards to inner
    async fn layered_generate(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<ProviderResult, LoraixError> {
        self.inner().generate(req, ctx).await
    }

    /// Default implementation for supports_streaming - forwards to inner
    fn layered_supports_streaming(&self) -> bool {
        self.inner().supports_streaming()
    }

    /// Default implementation for stream - forwards to inner
    async fn layered_stream(
        &self,
        req: ProviderRequest,
        ctx: AttemptContext,
    ) -> Result<TextStream, LoraixError> {
        self.inner().stream(req, ctx).await
    }
}

/// Macro to implement Provider trait by forwarding to LayeredProvider methods.
#[macro_export]
macro_rules! impl_layered_provider {
    ($type:ty) => {
        #[async_trait::async_trait]
        impl $crate::provider::Provider for $type {
            fn info(&self) -> std::sync::Arc<$crate::types::ProviderInfo> {
                $crate::layer::LayeredProvider::layered_info(self)
            }

            async fn generate(
                &self,
                req: $crate::types::ProviderRequest,
                ctx: $crate::types::AttemptContext,
            ) -> Result<$crate::types::ProviderResult, $crate::error::LoraixError> {
                $crate::layer::LayeredProvider::layered_generate(self, req, ctx).await
            }

            fn supports_streaming(&self) -> bool {
                $crate::layer::LayeredProvider::layered_supports_streaming(self)
            }

            async fn stream(
                &self,
                req: $crate::types::ProviderRequest,
                ctx: $crate::types::AttemptContext,
            ) -> Result<$crate::provider::TextStream, $crate::error::LoraixError> {
                $crate::layer::LayeredProvider::layered_stream(self, req, ctx).await
            }
        }
    };
}
