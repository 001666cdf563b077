//! The DevPilot backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devpilot_core::Message;
use reqwest::header::USER_AGENT;
use tracing::{debug, info};

use super::{build_client, Dispatch};
use crate::config::ProviderConfig;
use crate::credentials::{Credentials, CredentialsSource};
use crate::encode::EncodedBody;
use crate::error::ProviderError;
use crate::mask::mask_sensitive;
use crate::provider::{ChatOptions, ChatResponse, LlmProvider};
use crate::wire::{DevPilotRequest, EmbeddingInfo};

const NAME: &str = "ZA";
const DEFAULT_API_BASE: &str = "https://devpilot.zhongan.com";
const CHAT_PATH: &str = "/devpilot/v1/chat/completions";
/// Chat path for accounts that logged in through the public channel.
const PUBLIC_CHAT_PATH: &str = "/aigc/v1/chat/completions";
const PUBLIC_AUTH_TYPE: &str = "wx";
const EMBEDDING_INFO_PATH: &str = "/devpilot/v1/rag/git_repo/embedding_info";

/// Provider for the DevPilot chat completions API.
pub struct DevPilotProvider {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialsSource>,
    api_base: String,
    stream: bool,
    encode_body: bool,
    request_timeout: Duration,
    client_name: String,
    client_version: String,
}

impl DevPilotProvider {
    pub fn new(
        config: &ProviderConfig,
        credentials: Arc<dyn CredentialsSource>,
    ) -> Result<Self, ProviderError> {
        let api_base = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();
        info!(
            api_base = %api_base,
            stream = config.stream,
            encode_body = config.encode_body,
            "Initialize DevPilot provider"
        );
        Ok(Self {
            client: build_client(config)?,
            credentials,
            api_base,
            stream: config.stream,
            encode_body: config.encode_body,
            request_timeout: config.request_timeout,
            client_name: config.client_name.clone(),
            client_version: config.client_version.clone(),
        })
    }

    fn chat_url(&self, credentials: &Credentials) -> String {
        let path = if credentials.auth_type == PUBLIC_AUTH_TYPE {
            PUBLIC_CHAT_PATH
        } else {
            CHAT_PATH
        };
        format!("{}{}", self.api_base, path)
    }

    fn user_agent(&self, credentials: &Credentials) -> String {
        format!(
            "{}|{}|{}|{}",
            self.client_name, self.client_version, credentials.token, credentials.user_id
        )
    }

    /// Attach the per-call identity headers.
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        credentials: &Credentials,
    ) -> reqwest::RequestBuilder {
        debug!(
            auth_type = %credentials.auth_type,
            token = %mask_sensitive(&credentials.token),
            "Authorizing DevPilot request"
        );
        request
            .header(USER_AGENT, self.user_agent(credentials))
            .header("Auth-Type", credentials.auth_type.as_str())
            .header("X-B3-Language", credentials.locale.language_tag())
    }
}

#[async_trait]
impl LlmProvider for DevPilotProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn chat(
        &self,
        messages: &[Message],
        options: ChatOptions,
    ) -> Result<ChatResponse, ProviderError> {
        let credentials = self.credentials.credentials();
        let stream = options.stream.unwrap_or(self.stream);
        let body = DevPilotRequest::new(messages, stream, credentials.locale);
        let url = self.chat_url(&credentials);
        debug!(url = %url, messages = body.messages.len(), repo = ?options.repo, "DevPilot chat request");

        let mut request = self.authorize(self.client.post(&url), &credentials);
        if let Some(repo) = options.repo.as_deref() {
            request = request.header("Embedded-Repos-V2", repo);
        }
        request = if self.encode_body {
            request.json(&EncodedBody::new(&body)?)
        } else {
            request.json(&body)
        };

        Dispatch {
            provider: NAME,
            stream,
            request_timeout: self.request_timeout,
            render_rag: options.repo.is_some(),
            cancel: &options.cancel,
        }
        .send(request)
        .await
    }

    async fn is_repo_embedded(&self, repo: &str) -> Result<bool, ProviderError> {
        let credentials = self.credentials.credentials();
        let url = format!("{}{}/{}", self.api_base, EMBEDDING_INFO_PATH, repo);
        let response = self
            .authorize(self.client.get(&url), &credentials)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status.as_u16(), body));
        }
        let info: EmbeddingInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(NAME, e))?;
        info!(repo = %repo, embedded = info.embedded, "Repository embedding state");
        Ok(info.embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::encode::decode_request_body;
    use crate::handle::ChatEvent;
    use crate::providers::test_support::{expect_stream, sse_body};
    use devpilot_core::{CodeReference, Functionality, Locale, Selection};
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(auth_type: &str) -> Arc<dyn CredentialsSource> {
        Arc::new(StaticCredentials::new(Credentials {
            token: "tok-123456".to_string(),
            user_id: "u-1".to_string(),
            auth_type: auth_type.to_string(),
            locale: Locale::Chinese,
        }))
    }

    fn provider(server: &MockServer, auth_type: &str, configure: impl FnOnce(&mut ProviderConfig)) -> DevPilotProvider {
        let mut config = ProviderConfig {
            endpoint: Some(server.uri()),
            client_name: "devpilot-test".to_string(),
            client_version: "9.9.9".to_string(),
            ..Default::default()
        };
        configure(&mut config);
        DevPilotProvider::new(&config, credentials(auth_type)).unwrap()
    }

    #[tokio::test]
    async fn test_streams_answer_with_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("User-Agent", "devpilot-test|9.9.9|tok-123456|u-1"))
            .and(header("Auth-Type", "za"))
            .and(header("X-B3-Language", "zh-CN"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&["It ", "calls foo."]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |_| {});
        let response = provider
            .chat(&[Message::user("explain this: foo()")], ChatOptions::default())
            .await
            .unwrap();
        let mut handle = expect_stream(response);

        let mut last = None;
        while let Some(event) = handle.next_event().await {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(ChatEvent::Text {
                text: "It calls foo.".to_string(),
                id: Some("chatcmpl-1".to_string())
            })
        );
        assert_eq!(handle.result().await.unwrap(), "It calls foo.");
    }

    #[tokio::test]
    async fn test_request_body_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let code_ref = CodeReference::new("file:///src/a.rs", "rust", "foo()", Selection::default());
        let messages = vec![Message::user("Explain this")
            .with_prompt("prompt")
            .with_code_ref(code_ref)
            .with_command(Functionality::ExplainCode)];

        let provider = provider(&server, "za", |_| {});
        let handle = expect_stream(provider.chat(&messages, ChatOptions::default()).await.unwrap());
        handle.result().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["version"], "V1");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["commandType"], "EXPLAIN_CODE");
        assert_eq!(body["messages"][0]["promptData"]["answerLanguage"], "Chinese");
        assert_eq!(body["messages"][0]["content"], "prompt");
    }

    #[tokio::test]
    async fn test_encoded_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |c| c.encode_body = true);
        let handle = expect_stream(
            provider
                .chat(&[Message::user("hello")], ChatOptions::default())
                .await
                .unwrap(),
        );
        handle.result().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let envelope: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(envelope["encoding"], "base64");
        let body = decode_request_body(envelope["data"].as_str().unwrap());
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[tokio::test]
    async fn test_repo_header_and_public_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PUBLIC_CHAT_PATH))
            .and(header("Embedded-Repos-V2", "devpilot-vscode"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server, "wx", |_| {});
        let options = ChatOptions::default().with_repo("devpilot-vscode");
        let handle = expect_stream(provider.chat(&[Message::user("q")], options).await.unwrap());
        assert_eq!(handle.result().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |_| {});
        let err = provider
            .chat(&[Message::user("q")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_non_streaming_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "feat: add chat"}}]
            })))
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |c| c.stream = false);
        let response = provider
            .chat(&[Message::user("diff")], ChatOptions::default())
            .await
            .unwrap();
        assert!(matches!(response, ChatResponse::Complete(text) if text == "feat: add chat"));
    }

    #[tokio::test]
    async fn test_options_disable_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "fix: handle empty diff"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |_| {});
        let options = ChatOptions::default().without_streaming();
        let response = provider.chat(&[Message::user("diff")], options).await.unwrap();
        assert!(matches!(response, ChatResponse::Complete(text) if text == "fix: handle empty diff"));
    }

    #[tokio::test]
    async fn test_cancelled_before_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |_| {});
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let response = provider
            .chat(&[Message::user("q")], ChatOptions::new(cancel))
            .await
            .unwrap();
        assert!(matches!(response, ChatResponse::Cancelled));
    }

    #[tokio::test]
    async fn test_repo_embedding_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/devpilot-vscode", EMBEDDING_INFO_PATH)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embedded": true})),
            )
            .mount(&server)
            .await;

        let provider = provider(&server, "za", |_| {});
        assert!(provider.is_repo_embedded("devpilot-vscode").await.unwrap());
    }
}
