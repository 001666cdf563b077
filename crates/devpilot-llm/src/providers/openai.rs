//! OpenAI chat completions, and the compatible core reused by Azure.

use std::time::Duration;

use async_trait::async_trait;
use devpilot_core::Message;
use tracing::{debug, info};

use super::{build_client, Dispatch};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::mask::mask_sensitive;
use crate::provider::{ChatOptions, ChatResponse, LlmProvider};
use crate::wire::OpenAiRequest;

const NAME: &str = "OpenAI";
const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// How the API key is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyHeader {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>`
    ApiKey,
}

/// Request shaping shared by OpenAI-compatible backends.
pub(crate) struct OpenAiCompatible {
    name: &'static str,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    key_header: KeyHeader,
    model: String,
    stream: bool,
    request_timeout: Duration,
}

impl OpenAiCompatible {
    pub(crate) fn new(
        name: &'static str,
        config: &ProviderConfig,
        endpoint: String,
        key_header: KeyHeader,
    ) -> Result<Self, ProviderError> {
        let api_key = config.api_key().map(str::to_string);
        info!(
            provider = name,
            endpoint = %endpoint,
            model = %config.model,
            api_key = %api_key.as_deref().map(mask_sensitive).unwrap_or_default(),
            proxy = ?config.proxy,
            "Initialize provider"
        );
        Ok(Self {
            name,
            client: build_client(config)?,
            endpoint,
            api_key,
            key_header,
            model: config.model.clone(),
            stream: config.stream,
            request_timeout: config.request_timeout,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) async fn chat(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey(self.name.to_string()))?;

        let stream = options.stream.unwrap_or(self.stream);
        let body = OpenAiRequest::new(messages, &self.model, stream);
        debug!(provider = self.name, messages = body.messages.len(), "Chat request");

        let request = self.client.post(&self.endpoint).json(&body);
        let request = match self.key_header {
            KeyHeader::Bearer => request.bearer_auth(api_key),
            KeyHeader::ApiKey => request.header("api-key", api_key),
        };

        Dispatch {
            provider: self.name,
            stream,
            request_timeout: self.request_timeout,
            render_rag: false,
            cancel: &options.cancel,
        }
        .send(request)
        .await
    }
}

/// Provider for the OpenAI API.
pub struct OpenAiProvider {
    inner: OpenAiCompatible,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            inner: OpenAiCompatible::new(NAME, config, endpoint, KeyHeader::Bearer)?,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
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
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            kind: ProviderKind::OpenAi,
            endpoint: Some(format!("{}/v1/chat/completions", server.uri())),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let server = MockServer::start().await;
        let provider = OpenAiProvider::new(&config(&server, Some(""))).unwrap();
        let err = provider
            .chat(&[Message::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OpenAI API key is required");
    }

    #[tokio::test]
    async fn test_streaming_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "stream": true,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "prompt text"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&["Hello", " world"]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server, Some("sk-test"))).unwrap();
        let messages = vec![
            Message::system("sys"),
            Message::user("shown").with_prompt("prompt text"),
            Message::divider(),
        ];
        let handle = expect_stream(
            provider
                .chat(&messages, ChatOptions::default())
                .await
                .unwrap(),
        );
        assert_eq!(handle.result().await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server, Some("sk-test"))).unwrap();
        let err = provider
            .chat(&[Message::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OpenAI request failed with 500");
        assert!(matches!(err, ProviderError::Http { status: 500, ref body, .. } if body == "overloaded"));
    }

    #[tokio::test]
    async fn test_non_streaming_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"choices": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut config = config(&server, Some("sk-test"));
        config.stream = false;
        config.request_timeout = Duration::from_millis(100);
        let provider = OpenAiProvider::new(&config).unwrap();
        let err = provider
            .chat(&[Message::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "OpenAI request timeout");
    }

    #[tokio::test]
    async fn test_cancelled_while_error_body_stalls() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio_util::sync::CancellationToken;

        // Error headers arrive, then the body stalls with the socket held open.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let config = ProviderConfig {
            kind: ProviderKind::OpenAi,
            endpoint: Some(format!("http://{}/v1/chat/completions", addr)),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let response = tokio::time::timeout(
            Duration::from_secs(3),
            provider.chat(&[Message::user("hi")], ChatOptions::new(cancel)),
        )
        .await
        .expect("chat should settle after cancellation")
        .unwrap();
        assert!(matches!(response, ChatResponse::Cancelled));
    }
}
