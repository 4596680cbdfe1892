//! Provider construction by name.
//!
//! Lets configuration files and CLIs pick a vendor with a plain string:
//!
//! ```ignore
//! use loraix_provider::{create_provider, ProviderOptions};
//!
//! let provider = create_provider("anthropic", ProviderOptions::new().with_api_key(key))?;
//! ```

use crate::dialect::{self, ChatDialect};
use crate::http::HttpChatProvider;
use crate::sigv4::AwsCredentials;
use loraix_core::error::LoraixError;
use loraix_core::provider::Provider;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Vendors that can be created by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderName {
    OpenAi,
    Anthropic,
    DeepSeek,
    Grok,
    Bedrock,
    Gemini,
    AzureOpenAi,
}

impl ProviderName {
    pub const ALL: [ProviderName; 7] = [
        ProviderName::OpenAi,
        ProviderName::Anthropic,
        ProviderName::DeepSeek,
        ProviderName::Grok,
        ProviderName::Bedrock,
        ProviderName::Gemini,
        ProviderName::AzureOpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "openai",
            ProviderName::Anthropic => "anthropic",
            ProviderName::DeepSeek => "deepseek",
            ProviderName::Grok => "grok",
            ProviderName::Bedrock => "bedrock",
            ProviderName::Gemini => "gemini",
            ProviderName::AzureOpenAi => "azure-openai",
        }
    }

    /// Build this vendor's provider from `options`
    pub fn create(self, options: ProviderOptions) -> Result<Arc<dyn Provider>, LoraixError> {
        match self {
            ProviderName::OpenAi => build(dialect::OpenAiCompatible::openai(), options),
            ProviderName::DeepSeek => build(dialect::OpenAiCompatible::deepseek(), options),
            ProviderName::Grok => build(dialect::OpenAiCompatible::grok(), options),
            ProviderName::Anthropic => build(dialect::Anthropic::new(), options),
            ProviderName::Gemini => build(dialect::Gemini::new(), options),
            ProviderName::AzureOpenAi => {
                let deployment = options.deployment.clone().ok_or_else(|| {
                    LoraixError::configuration("Azure OpenAI requires a deployment.")
                })?;
                let mut azure = dialect::AzureOpenAi::new(deployment);
                if let Some(resource) = &options.resource {
                    azure = azure.with_resource(resource.clone());
                }
                if let Some(api_version) = &options.api_version {
                    azure = azure.with_api_version(api_version.clone());
                }
                build(azure, options)
            }
            ProviderName::Bedrock => {
                let region = options.region.clone().ok_or_else(|| {
                    LoraixError::configuration("Amazon Bedrock requires a region.")
                })?;
                let credentials = options.credentials.clone().ok_or_else(|| {
                    LoraixError::configuration("Amazon Bedrock requires AWS credentials.")
                })?;
                build(dialect::Bedrock::new(region, credentials), options)
            }
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = LoraixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| LoraixError::configuration(format!("Unknown provider: {}", s)))
    }
}

/// Settings for [`create_provider`].
///
/// Each vendor reads only the fields it understands: `region` and
/// `credentials` for Bedrock, `resource`, `deployment` and `api_version`
/// for Azure OpenAI, `api_key` for everything else.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub region: Option<String>,
    pub credentials: Option<AwsCredentials>,
    pub resource: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
    pub client: Option<reqwest::Client>,
    pub headers: Vec<(String, String)>,
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Send an extra header with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Create a provider from its name.
///
/// Fails with [`LoraixError::Configuration`] for names outside
/// [`ProviderName::ALL`] or options the vendor rejects.
pub fn create_provider(
    name: &str,
    options: ProviderOptions,
) -> Result<Arc<dyn Provider>, LoraixError> {
    name.parse::<ProviderName>()?.create(options)
}

fn build<D: ChatDialect>(
    dialect: D,
    options: ProviderOptions,
) -> Result<Arc<dyn Provider>, LoraixError> {
    let mut builder = HttpChatProvider::builder(dialect);
    if let Some(api_key) = options.api_key {
        builder = builder.api_key(api_key);
    }
    if let Some(api_base) = options.api_base {
        builder = builder.api_base(api_base);
    }
    if let Some(client) = options.client {
        builder = builder.client(client);
    }
    for (name, value) in options.headers {
        builder = builder.header(name, value);
    }
    Ok(Arc::new(builder.build()?))
}
