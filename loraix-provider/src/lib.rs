//! # Loraix Providers
//!
//! HTTP chat adapters for the vendors Loraix can talk to. Every adapter is
//! an [`HttpChatProvider`] configured with a vendor [`ChatDialect`].
//!
//! Credentials are always passed in explicitly; nothing in this crate reads
//! the environment.

pub mod dialect;
pub mod http;
pub mod registry;
pub mod sigv4;
pub mod stream;

// Re-exports
pub use dialect::{
    Anthropic, AzureOpenAi, Bedrock, ChatDialect, Gemini, OpenAiCompatible, StreamFraming,
};
pub use http::{HttpChatBuilder, HttpChatProvider};
pub use registry::{create_provider, ProviderName, ProviderOptions};
pub use sigv4::AwsCredentials;

use loraix_core::error::LoraixError;

/// Provider for OpenAI chat completions
pub type OpenAiProvider = HttpChatProvider<OpenAiCompatible>;

/// Create an OpenAI provider
///
/// # Example
///
/// ```ignore
/// use loraix_provider::openai;
///
/// let provider = openai("your-api-key")?;
/// ```
pub fn openai(api_key: impl Into<String>) -> Result<OpenAiProvider, LoraixError> {
    HttpChatProvider::builder(OpenAiCompatible::openai())
        .api_key(api_key)
        .build()
}

/// Create a DeepSeek provider (OpenAI-compatible)
///
/// DeepSeek uses the OpenAI API protocol but with a different endpoint.
pub fn deepseek(api_key: impl Into<String>) -> Result<OpenAiProvider, LoraixError> {
    HttpChatProvider::builder(OpenAiCompatible::deepseek())
        .api_key(api_key)
        .build()
}

/// Create an xAI Grok provider (OpenAI-compatible)
pub fn grok(api_key: impl Into<String>) -> Result<OpenAiProvider, LoraixError> {
    HttpChatProvider::builder(OpenAiCompatible::grok())
        .api_key(api_key)
        .build()
}

/// Create an Anthropic provider
pub fn anthropic(api_key: impl Into<String>) -> Result<HttpChatProvider<Anthropic>, LoraixError> {
    HttpChatProvider::builder(Anthropic::new())
        .api_key(api_key)
        .build()
}

/// Create a Google Gemini provider
pub fn gemini(api_key: impl Into<String>) -> Result<HttpChatProvider<Gemini>, LoraixError> {
    HttpChatProvider::builder(Gemini::new())
        .api_key(api_key)
        .build()
}

/// Create an Azure OpenAI provider for one deployment of `resource`
///
/// # Example
///
/// ```ignore
/// use loraix_provider::azure_openai;
///
/// let provider = azure_openai("your-api-key", "contoso", "gpt-4o-prod")?;
/// ```
pub fn azure_openai(
    api_key: impl Into<String>,
    resource: impl Into<String>,
    deployment: impl Into<String>,
) -> Result<HttpChatProvider<AzureOpenAi>, LoraixError> {
    HttpChatProvider::builder(AzureOpenAi::new(deployment).with_resource(resource))
        .api_key(api_key)
        .build()
}

/// Create an Amazon Bedrock provider; requests are SigV4-signed
///
/// # Example
///
/// ```ignore
/// use loraix_provider::{bedrock, AwsCredentials};
///
/// let provider = bedrock("us-east-1", AwsCredentials::new(access_key_id, secret_access_key))?;
/// ```
pub fn bedrock(
    region: impl Into<String>,
    credentials: AwsCredentials,
) -> Result<HttpChatProvider<Bedrock>, LoraixError> {
    HttpChatProvider::builder(Bedrock::new(region, credentials)).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loraix_core::provider::Provider;

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(deepseek("k").unwrap().base_url(), "https://api.deepseek.com/v1");
        assert_eq!(grok("k").unwrap().info().id, "grok");
        assert_eq!(anthropic("k").unwrap().info().name, "Anthropic");
        assert_eq!(
            gemini("k").unwrap().base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            azure_openai("k", "contoso", "prod").unwrap().base_url(),
            "https://contoso.openai.azure.com"
        );
        assert_eq!(
            bedrock("eu-west-1", AwsCredentials::new("AKID", "secret"))
                .unwrap()
                .base_url(),
            "https://bedrock-runtime.eu-west-1.amazonaws.com"
        );
        assert!(openai("").is_err());
    }
}
