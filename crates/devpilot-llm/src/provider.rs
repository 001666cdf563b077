//! The provider abstraction shared by every backend.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use devpilot_core::{CoreError, Message};
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::credentials::CredentialsSource;
use crate::error::ProviderError;
use crate::handle::ChatHandle;
use crate::providers::{AzureProvider, DevPilotProvider, OpenAiProvider};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Repository id for retrieval-augmented turns.
    pub repo: Option<String>,
    /// Cancels the request and, once streaming, the body read.
    pub cancel: CancellationToken,
    /// Overrides the configured streaming mode for this call.
    pub stream: Option<bool>,
}

impl ChatOptions {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            repo: None,
            cancel,
            stream: None,
        }
    }

    /// Builder method to ask for a complete answer.
    pub fn without_streaming(mut self) -> Self {
        self.stream = Some(false);
        self
    }

    /// Builder method to set the repository id.
    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }
}

/// Outcome of a chat call.
#[derive(Debug)]
pub enum ChatResponse {
    /// Non-streaming answer.
    Complete(String),
    /// Streaming answer.
    Streaming(ChatHandle),
    /// The caller cancelled before a response arrived.
    Cancelled,
}

/// A language model backend.
///
/// Each `chat` call issues exactly one outbound request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Display name, used in error messages and logs.
    fn name(&self) -> &str;

    /// Send `messages` and return the answer.
    ///
    /// Messages with roles the backend does not accept are dropped.
    async fn chat(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<ChatResponse, ProviderError>;

    /// Whether `repo` has been indexed for retrieval-augmented answers.
    async fn is_repo_embedded(&self, _repo: &str) -> Result<bool, ProviderError> {
        Ok(false)
    }
}

/// Backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// The DevPilot backend (`ZA`).
    #[default]
    DevPilot,
    OpenAi,
    Azure,
}

impl ProviderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::DevPilot => "ZA",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Azure => "Azure",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ProviderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "za" | "devpilot" => Ok(ProviderKind::DevPilot),
            "openai" => Ok(ProviderKind::OpenAi),
            "azure" => Ok(ProviderKind::Azure),
            _ => Err(CoreError::UnknownProvider(s.to_string())),
        }
    }
}

/// Build the provider selected by `config.kind`.
pub fn build_provider(
    config: &ProviderConfig,
    credentials: Arc<dyn CredentialsSource>,
) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderKind::DevPilot => Arc::new(DevPilotProvider::new(config, credentials)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config)?),
        ProviderKind::Azure => Arc::new(AzureProvider::new(config)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;

    #[test]
    fn test_kind_parse() {
        assert_eq!("ZA".parse::<ProviderKind>().unwrap(), ProviderKind::DevPilot);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Azure".parse::<ProviderKind>().unwrap(), ProviderKind::Azure);
        assert!("anthropic".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_build_provider_names() {
        let credentials: Arc<dyn CredentialsSource> = Arc::new(StaticCredentials::default());

        let provider = build_provider(&ProviderConfig::default(), credentials.clone()).unwrap();
        assert_eq!(provider.name(), "ZA");

        let config = ProviderConfig::for_kind(ProviderKind::OpenAi);
        let provider = build_provider(&config, credentials.clone()).unwrap();
        assert_eq!(provider.name(), "OpenAI");

        let mut config = ProviderConfig::for_kind(ProviderKind::Azure);
        config.endpoint = Some("https://example.openai.azure.com/chat".to_string());
        let provider = build_provider(&config, credentials).unwrap();
        assert_eq!(provider.name(), "Azure");
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let credentials: Arc<dyn CredentialsSource> = Arc::new(StaticCredentials::default());
        let config = ProviderConfig::for_kind(ProviderKind::Azure);
        assert!(matches!(
            build_provider(&config, credentials),
            Err(ProviderError::InvalidConfig(_))
        ));
    }
}
