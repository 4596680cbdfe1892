//! # Loraix Interceptors
//!
//! Built-in interceptors for Loraix.
//!
//! - `TracingInterceptor`: structured logs at request, attempt and response
//! - `UsageTracker`: per-provider call, attempt and token tallies

pub mod trace;
pub mod usage;

// Re-exports
pub use trace::TracingInterceptor;
pub use usage::{ProviderUsage, UsageSnapshot, UsageTracker};
