//! # Loraix
//!
//! Multi-provider LLM runtime for Rust.
//!
//! Loraix puts OpenAI, Anthropic, Gemini, Grok, DeepSeek, Azure OpenAI and
//! Bedrock behind one provider trait, and adds the pieces every production
//! caller ends up writing by hand: per-provider retries with exponential
//! backoff, an ordered fallback chain, per-attempt and per-chunk deadlines,
//! and JSON output checked against a shallow schema.
//!
//! ## Features
//!
//! - **One adapter, many vendors**: a single HTTP adapter parameterized by vendor dialect
//! - **Retry and fallback**: attempts are counted across every provider in a call
//! - **Deadlines**: timed-out attempts are cancelled, stalled streams are dropped
//! - **Structured output**: one repair round, then a non-retryable validation error
//! - **Interceptors and layers**: hook into calls and wrap providers
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! loraix = { version = "0.1", features = ["full"] }
//! ```
//!
//! ```ignore
//! use loraix::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<()> {
//! let runtime = Runtime::builder(openai("your-api-key")?)
//!     .layer(LoggingLayer::new())
//!     .model("gpt-4o-mini")
//!     .fallback(anthropic("your-other-key")?)
//!     .timeout(Duration::from_secs(30))
//!     .finish()?;
//!
//! let response = runtime
//!     .generate("What is Rust?", CallOptions::new())
//!     .await?;
//! println!("{} (via {})", response.text, response.provider);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: providers, layers and interceptors
//! - `providers`: HTTP adapters for every supported vendor
//! - `layers`: Built-in provider layers (logging)
//! - `interceptors`: Built-in interceptors (tracing, usage accounting)
//! - `schema`: Derive shallow schemas from `schemars::JsonSchema` types
//! - `full`: All features enabled

// Re-export core types and traits
pub use loraix_core::*;

// Re-export providers under `provider` module
#[cfg(feature = "loraix-provider")]
pub mod provider {
    //! Vendor adapters.
    pub use loraix_provider::*;
}

// Re-export layers under `layer` module
#[cfg(feature = "loraix-layer")]
pub mod layer {
    //! Built-in provider layers.
    pub use loraix_layer::*;
}

// Re-export interceptors under `interceptor` module
#[cfg(feature = "loraix-interceptor")]
pub mod interceptor {
    //! Built-in interceptors.
    pub use loraix_interceptor::*;
}

// Re-export schemars when schema feature is enabled
#[cfg(feature = "schema")]
pub mod schemars {
    pub use ::schemars::*;
}

/// Shallow schema for a type deriving `schemars::JsonSchema`
///
/// ```ignore
/// #[derive(serde::Deserialize, schemars::JsonSchema)]
/// struct Person {
///     name: String,
///     age: u32,
/// }
///
/// let request = JsonRequest::new("Describe Ava.").with_schema(schema_of::<Person>());
/// ```
#[cfg(feature = "schema")]
pub fn schema_of<T: ::schemars::JsonSchema>() -> ShallowSchema {
    ShallowSchema::from_json_schema(::schemars::schema_for!(T).as_value())
}

/// Runtime builder for a provider chosen by name, with `model` preset.
///
/// Runtime options (fallbacks, timeout, retries, ...) are chained on the
/// returned builder before `finish()`.
///
/// ```ignore
/// let runtime = loraix::create_client(
///     "deepseek",
///     ProviderOptions::new().with_api_key(key),
///     "deepseek-chat",
/// )?
/// .max_retries(1)
/// .finish()?;
/// ```
#[cfg(feature = "loraix-provider")]
pub fn create_client(
    name: &str,
    options: provider::ProviderOptions,
    model: impl Into<String>,
) -> Result<RuntimeBuilder<std::sync::Arc<dyn Provider>>> {
    let primary = provider::create_provider(name, options)?;
    Ok(Runtime::builder(primary).model(model))
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use loraix::prelude::*;
    //! ```

    pub use crate::{
        CallOptions, ChatMessage, FieldKind, Input, Interceptor, JsonRequest, Layer,
        LoraixError, LoraixResponse, Provider, Result, Role, Runtime, RuntimeConfig,
        ShallowSchema, Usage,
    };

    #[cfg(feature = "loraix-provider")]
    pub use crate::provider::*;

    #[cfg(feature = "loraix-provider")]
    pub use crate::create_client;

    #[cfg(feature = "loraix-layer")]
    pub use crate::layer::*;

    #[cfg(feature = "loraix-interceptor")]
    pub use crate::interceptor::*;

    #[cfg(feature = "schema")]
    pub use crate::schema_of;
}

#[cfg(all(test, feature = "loraix-provider"))]
mod client_tests {
    use super::*;

    #[test]
    fn test_create_client_by_name() {
        let runtime = create_client(
            "grok",
            provider::ProviderOptions::new().with_api_key("k"),
            "grok-2",
        )
        .unwrap()
        .max_retries(0)
        .finish()
        .unwrap();

        assert_eq!(runtime.info().id, "grok");
        assert_eq!(runtime.config().model, "grok-2");
        assert_eq!(runtime.config().max_retries, 0);

        let err = create_client("nope", provider::ProviderOptions::new(), "m")
            .err()
            .unwrap();
        assert!(matches!(err, LoraixError::Configuration(_)));
    }
}

#[cfg(all(test, feature = "schema"))]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(::schemars::JsonSchema)]
    struct Person {
        name: String,
        age: u32,
        nickname: Option<String>,
        tags: Vec<String>,
    }

    #[test]
    fn test_schema_of_derives_fields() {
        let schema = schema_of::<Person>();
        let fields: Vec<_> = schema.fields().collect();
        assert_eq!(
            fields,
            vec![
                ("age", FieldKind::Number),
                ("name", FieldKind::String),
                ("nickname", FieldKind::String),
                ("tags", FieldKind::Array),
            ]
        );
    }
}
