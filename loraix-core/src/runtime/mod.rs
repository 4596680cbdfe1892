//! Runtime layer for Loraix Core.
//!
//! The runtime sits between the caller-facing API (`generate`, `json`,
//! `stream`) and the provider interface. It is responsible for:
//! - Resolving per-call overrides against the configured defaults
//! - Running interceptors around each call and attempt
//! - Retrying transient failures and walking the fallback chain
//! - Enforcing per-attempt and per-chunk deadlines

pub mod config;
pub mod executor;

pub use config::{RuntimeBuilder, RuntimeConfig, DEFAULT_MAX_RETRIES};
pub use executor::{generate, Runtime};
