//! Provider configuration.

use std::time::Duration;

use crate::provider::ProviderKind;

/// Configuration for building an LLM provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which backend to talk to.
    pub kind: ProviderKind,

    /// Endpoint override. For DevPilot this is the API base; for OpenAI and
    /// Azure the full chat completions URL.
    pub endpoint: Option<String>,

    /// API key (OpenAI and Azure).
    pub api_key: Option<String>,

    /// Model name sent to OpenAI-compatible backends.
    pub model: String,

    /// HTTPS proxy URL.
    pub proxy: Option<String>,

    /// Request streamed answers.
    pub stream: bool,

    /// Send the DevPilot request body gzip + base64 encoded.
    pub encode_body: bool,

    /// Deadline for non-streaming requests.
    pub request_timeout: Duration,

    /// Deadline for establishing the connection.
    pub connect_timeout: Duration,

    /// Client identity placed in the DevPilot `User-Agent`.
    pub client_name: String,

    /// Client version placed in the DevPilot `User-Agent`.
    pub client_version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::DevPilot,
            endpoint: None,
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            proxy: None,
            stream: true,
            encode_body: false,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            client_name: "devpilot-cli".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ProviderConfig {
    /// Default configuration for `kind`.
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// API key, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}
