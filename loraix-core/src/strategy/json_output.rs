//! JSON output strategies.
//!
//! A strategy decides how the "answer in JSON" instruction is added to the
//! conversation before the structured-output layer calls the runtime:
//! - StrictJsonStrategy: one trailing system message demanding bare JSON
//! - SchemaHintStrategy: the same, plus the expected top-level fields

use super::schema::ShallowSchema;
use crate::types::ChatMessage;

/// Instruction appended to every structured-output conversation
pub const STRICT_JSON_INSTRUCTION: &str =
    "Respond ONLY with strict JSON. No markdown, prose, or code fences.";

/// Strategy for injecting JSON instructions into a conversation.
pub trait JsonOutputStrategy: Send + Sync + std::fmt::Debug {
    /// Get the strategy name for debugging
    fn name(&self) -> &str;

    /// Add the JSON instruction to `messages`
    fn apply(&self, messages: &mut Vec<ChatMessage>, schema: &ShallowSchema);
}

/// Appends a single system message demanding strict JSON.
#[derive(Debug, Clone, Default)]
pub struct StrictJsonStrategy;

impl StrictJsonStrategy {
    /// Create a new strict JSON strategy
    pub fn new() -> Self {
        Self
    }
}

impl JsonOutputStrategy for StrictJsonStrategy {
    fn name(&self) -> &str {
        "StrictJsonStrategy"
    }

    fn apply(&self, messages: &mut Vec<ChatMessage>, _schema: &ShallowSchema) {
        messages.push(ChatMessage::system(STRICT_JSON_INSTRUCTION));
    }
}

/// Appends the strict JSON instruction together with the expected fields.
///
/// Useful for models that drift from the requested shape; the schema is
/// rendered as `name: kind` lines.
#[derive(Debug, Clone)]
pub struct SchemaHintStrategy {
    /// Whether to inject the hint as a system message (true) or append it to the last user message (false)
    pub use_system_message: bool,
}

impl SchemaHintStrategy {
    /// Create a new schema hint strategy that uses system messages
    pub fn new() -> Self {
        Self {
            use_system_message: true,
        }
    }

    /// Create a new schema hint strategy with configurable message injection
    pub fn with_system_message(use_system_message: bool) -> Self {
        Self { use_system_message }
    }

    fn build_instruction(schema: &ShallowSchema) -> String {
        if schema.is_empty() {
            return STRICT_JSON_INSTRUCTION.to_string();
        }

        let fields = schema
            .fields()
            .map(|(name, kind)| format!("- {}: {}", name, kind))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\nThe top-level JSON object must contain these fields:\n{}",
            STRICT_JSON_INSTRUCTION, fields
        )
    }
}

impl Default for SchemaHintStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonOutputStrategy for SchemaHintStrategy {
    fn name(&self) -> &str {
        "SchemaHintStrategy"
    }

    fn apply(&self, messages: &mut Vec<ChatMessage>, schema: &ShallowSchema) {
        let instruction = Self::build_instruction(schema);

        if self.use_system_message {
            messages.push(ChatMessage::system(instruction));
            return;
        }

        match messages
            .iter_mut()
            .rev()
            .find(|m| m.role == crate::types::Role::User)
        {
            Some(last_user) => {
                last_user.content.push_str("\n\n");
                last_user.content.push_str(&instruction);
            }
            None => messages.push(ChatMessage::user(instruction)),
        }
    }
}
