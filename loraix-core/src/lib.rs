//! # Loraix Core
//!
//! Core abstractions and runtime for calling large language models across
//! several providers in Rust.
//!
//! This crate provides the provider trait, the error taxonomy shared by
//! every adapter, and the runtime that layers retry, fallback, timeout and
//! structured JSON output on top of them.

pub mod error;
pub mod interceptor;
pub mod layer;
pub mod provider;
pub mod retry;
pub mod runtime;
pub mod strategy;
pub mod timeout;
pub mod types;

// Re-exports
pub use error::LoraixError;
pub use interceptor::{Interceptor, InterceptorChain, InterceptorPhase};
pub use layer::{Layer, LayeredProvider};
pub use provider::{Provider, TextStream};
pub use retry::{BackoffStrategy, ExponentialBackoff, FnBackoff, RetryPolicy, RetrySettings};
pub use runtime::{generate, Runtime, RuntimeBuilder, RuntimeConfig};
pub use strategy::{
    FieldKind, JsonOutputStrategy, SchemaHintStrategy, ShallowSchema, StrictJsonStrategy,
};
pub use types::*;

/// Result type alias for Loraix operations
pub type Result<T> = std::result::Result<T, LoraixError>;
