//! Structured-output strategies.
//!
//! This module holds the pieces the runtime's `json()` call is built from:
//! how the JSON instruction is injected and how the reply is checked.

pub mod json_output;
pub mod schema;

pub use json_output::{
    JsonOutputStrategy, SchemaHintStrategy, StrictJsonStrategy, STRICT_JSON_INSTRUCTION,
};
pub use schema::{FieldKind, ShallowSchema};
