//! Azure OpenAI deployments.

use super::openai::{
    chat_completions_body, chat_completions_delta, chat_completions_text, chat_completions_usage,
};
use super::{trim_base, ChatDialect};
use loraix_core::types::{ProviderRequest, Usage};
use reqwest::RequestBuilder;
use serde_json::Value;

/// Default `api-version` query parameter
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Azure OpenAI dialect.
///
/// The model is chosen by the deployment in the URL, so the request body
/// carries no `model` field.
#[derive(Debug, Clone)]
pub struct AzureOpenAi {
    resource: Option<String>,
    deployment: String,
    api_version: String,
}

impl AzureOpenAi {
    /// Dialect for `deployment`; set a base URL on the builder or a resource
    /// name here
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            resource: None,
            deployment: deployment.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }

    /// Derive the base URL from an Azure resource name
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Override the `api-version` query parameter
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }
}

impl ChatDialect for AzureOpenAi {
    fn id(&self) -> &str {
        "azure-openai"
    }

    fn name(&self) -> &str {
        "Azure OpenAI"
    }

    fn default_base_url(&self) -> Option<String> {
        self.resource
            .as_ref()
            .filter(|r| !r.is_empty())
            .map(|r| format!("https://{}.openai.azure.com", r))
    }

    fn endpoint(&self, base_url: &str, _req: &ProviderRequest, _stream: bool) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            trim_base(base_url),
            self.deployment,
            self.api_version
        )
    }

    fn authorize(&self, builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
        match api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn body(&self, req: &ProviderRequest, stream: bool) -> Value {
        chat_completions_body(req, stream, false)
    }

    fn text(&self, response: &Value) -> String {
        chat_completions_text(response)
    }

    fn usage(&self, response: &Value) -> Option<Usage> {
        chat_completions_usage(response)
    }

    fn delta(&self, payload: &Value) -> Option<String> {
        chat_completions_delta(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loraix_core::types::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_endpoint_from_resource() {
        let dialect = AzureOpenAi::new("gpt4o").with_resource("contoso");
        let base = dialect.default_base_url().unwrap();
        let req = ProviderRequest::new("ignored", vec![]);
        assert_eq!(
            dialect.endpoint(&base, &req, false),
            "https://contoso.openai.azure.com/openai/deployments/gpt4o/chat/completions?api-version=2024-10-21"
        );
    }

    #[test]
    fn test_body_has_no_model() {
        let req = ProviderRequest::new("gpt-4o", vec![ChatMessage::user("hi")]);
        let body = AzureOpenAi::new("d").body(&req, true);
        assert!(body.get("model").is_none());
        assert_eq!(body["stream"], json!(true));
    }

    #[test]
    fn test_no_base_without_resource() {
        assert_eq!(AzureOpenAi::new("d").default_base_url(), None);
        assert_eq!(AzureOpenAi::new("d").with_resource("").default_base_url(), None);
    }
}
