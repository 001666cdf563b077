//! Azure OpenAI deployments.

use async_trait::async_trait;
use devpilot_core::Message;

use super::openai::{KeyHeader, OpenAiCompatible};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::provider::{ChatOptions, ChatResponse, LlmProvider};

const NAME: &str = "Azure";

/// Provider for an Azure OpenAI deployment.
///
/// The endpoint is the deployment's full chat completions URL, including
/// the `api-version` query.
pub struct AzureProvider {
    inner: OpenAiCompatible,
}

impl AzureProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidConfig("Azure requires a deployment endpoint".to_string())
            })?;
        Ok(Self {
            inner: OpenAiCompatible::new(NAME, config, endpoint, KeyHeader::ApiKey)?,
        })
    }
}

#[async_trait]
impl LlmProvider for AzureProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        self.inner.chat(messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use crate::providers::test_support::{expect_stream, sse_body};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt/chat/completions"))
            .and(query_param("api-version", "2024-02-01"))
            .and(header("api-key", "azure-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["hi"]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = ProviderConfig {
            kind: ProviderKind::Azure,
            endpoint: Some(format!(
                "{}/openai/deployments/gpt/chat/completions?api-version=2024-02-01",
                server.uri()
            )),
            api_key: Some("azure-key".to_string()),
            ..Default::default()
        };
        let provider = AzureProvider::new(&config).unwrap();
        let handle = expect_stream(
            provider
                .chat(&[Message::user("q")], ChatOptions::default())
                .await
                .unwrap(),
        );
        assert_eq!(handle.result().await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = ProviderConfig {
            kind: ProviderKind::Azure,
            endpoint: Some(server.uri()),
            api_key: Some("azure-key".to_string()),
            ..Default::default()
        };
        let provider = AzureProvider::new(&config).unwrap();
        let err = provider
            .chat(&[Message::user("q")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Azure request failed with 401");
    }
}
