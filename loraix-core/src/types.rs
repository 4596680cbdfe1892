//! Core types for runtime operations.

use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Join the content of all system messages with newlines.
///
/// Returns `None` when the conversation has no system text, for vendors that
/// take the system prompt as a separate field.
pub fn system_prompt(messages: &[ChatMessage]) -> Option<String> {
    let text = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Caller input: a bare prompt or an explicit conversation
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Prompt(String),
    Messages(Vec<ChatMessage>),
}

impl Input {
    /// Convert the input into an ordered message sequence
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Input::Prompt(prompt) => vec![ChatMessage::user(prompt)],
            Input::Messages(messages) => messages,
        }
    }
}

impl From<&str> for Input {
    fn from(prompt: &str) -> Self {
        Input::Prompt(prompt.to_string())
    }
}

impl From<String> for Input {
    fn from(prompt: String) -> Self {
        Input::Prompt(prompt)
    }
}

impl From<Vec<ChatMessage>> for Input {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Input::Messages(messages)
    }
}

/// Vendor-neutral chat request handed to a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderRequest {
    /// Create a new request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token usage statistics. Fields the vendor did not report stay `None`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

impl Usage {
    /// Returns `None` when no field was reported at all
    pub fn non_empty(self) -> Option<Self> {
        if self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
        {
            None
        } else {
            Some(self)
        }
    }
}

/// Result of a single successful provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Opaque vendor payload
    pub raw: serde_json::Value,
}

/// Final normalized result of a logical call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraixResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    /// Id of the provider that produced the result
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub latency_ms: u64,
    /// Attempts across every provider tried in this call
    pub attempts: u32,
    pub fallback_used: bool,
    pub raw: serde_json::Value,
}

/// Provider information
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
}

impl ProviderInfo {
    /// Create provider info
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Per-attempt context handed to a provider.
///
/// The cancellation token is created fresh for every attempt and is
/// cancelled when the attempt deadline fires.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub timeout: Option<Duration>,
    pub attempt: u32,
    pub cancel: CancellationToken,
}

impl AttemptContext {
    /// Create a context with a fresh cancellation token
    pub fn new(attempt: u32, timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            attempt,
            cancel: CancellationToken::new(),
        }
    }
}

/// Context for one logical call, shared by every interceptor hook
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub model: String,
    pub metadata: Arc<HashMap<String, String>>,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
            metadata: Arc::new(HashMap::new()),
        }
    }

    /// Create context with metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }
}

/// Payload of the per-attempt interceptor hook
#[derive(Debug)]
pub struct AttemptEvent<'a> {
    pub provider: &'a str,
    pub attempt: u32,
    pub request: &'a ProviderRequest,
    pub context: &'a RequestContext,
}

/// Per-call overrides. Unset fields fall back to the runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub provider: Option<Arc<dyn Provider>>,
    pub fallback_providers: Option<Vec<Arc<dyn Provider>>>,
}

impl CallOptions {
    /// Create empty call options
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the per-attempt (and per-chunk) timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry budget per provider
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Override the primary provider
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Override the fallback chain
    pub fn with_fallback_providers(mut self, providers: Vec<Arc<dyn Provider>>) -> Self {
        self.fallback_providers = Some(providers);
        self
    }
}

/// Structured-output request
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub input: Input,
    pub schema: crate::strategy::ShallowSchema,
    pub options: CallOptions,
}

impl JsonRequest {
    /// Create a structured-output request with an empty schema
    pub fn new(input: impl Into<Input>) -> Self {
        Self {
            input: input.into(),
            schema: crate::strategy::ShallowSchema::default(),
            options: CallOptions::default(),
        }
    }

    /// Set the shallow schema
    pub fn with_schema(mut self, schema: crate::strategy::ShallowSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set per-call options
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }
}
