//! # Loraix Layers
//!
//! Built-in provider layers for Loraix.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs every vendor call and stream with timing information
//!
//! Retries are not a layer: the runtime owns the retry and fallback loop so
//! that attempts are counted across providers.
//!
//! ## Usage
//!
//! ```ignore
//! use loraix_core::Runtime;
//! use loraix_layer::LoggingLayer;
//!
//! let runtime = Runtime::builder(provider)
//!     .layer(LoggingLayer::new())
//!     .model("gpt-4o-mini")
//!     .finish()?;
//! ```

pub mod logging;

// Re-exports
pub use logging::{LoggingLayer, LoggingProvider};
