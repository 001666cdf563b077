//! Concrete backends and the HTTP plumbing they share.

mod azure;
mod devpilot;
mod openai;

pub use azure::AzureProvider;
pub use devpilot::DevPilotProvider;
pub use openai::OpenAiProvider;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collect::stream_chat;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::handle::Interrupter;
use crate::provider::ChatResponse;
use crate::wire::CompletionResponse;

/// Build the HTTP client for a provider.
pub(crate) fn build_client(config: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
    if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::https(proxy)
            .map_err(|e| ProviderError::InvalidConfig(format!("invalid proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ProviderError::InvalidConfig(e.to_string()))
}

/// How a prepared request should be sent and read.
pub(crate) struct Dispatch<'a> {
    pub provider: &'a str,
    pub stream: bool,
    pub request_timeout: Duration,
    pub render_rag: bool,
    pub cancel: &'a CancellationToken,
}

impl Dispatch<'_> {
    /// Send `request` and turn the response into a [`ChatResponse`].
    ///
    /// Only non-streaming requests carry `request_timeout`; a streamed body
    /// is bounded by interruption instead.
    pub(crate) async fn send(
        self,
        request: reqwest::RequestBuilder,
    ) -> Result<ChatResponse, ProviderError> {
        let request = if self.stream {
            request
        } else {
            request.timeout(self.request_timeout)
        };

        let response = tokio::select! {
            _ = self.cancel.cancelled() => {
                info!(provider = %self.provider, "Chat request cancelled");
                return Ok(ChatResponse::Cancelled);
            }
            result = request.send() => {
                result.map_err(|e| ProviderError::from_reqwest(self.provider, e))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(
                        provider = %self.provider,
                        status = status.as_u16(),
                        "Chat request cancelled while reading error body"
                    );
                    return Ok(ChatResponse::Cancelled);
                }
                body = response.text() => body.unwrap_or_default(),
            };
            warn!(
                provider = %self.provider,
                status = status.as_u16(),
                "Chat request failed"
            );
            return Err(ProviderError::from_status(self.provider, status.as_u16(), body));
        }

        if self.stream {
            debug!(provider = %self.provider, "Streaming chat response");
            let interrupter = Interrupter::child_of(self.cancel);
            let handle = stream_chat(
                self.provider,
                response.bytes_stream(),
                interrupter,
                self.render_rag,
            );
            return Ok(ChatResponse::Streaming(handle));
        }

        let completion = tokio::select! {
            _ = self.cancel.cancelled() => {
                info!(provider = %self.provider, "Chat request cancelled");
                return Ok(ChatResponse::Cancelled);
            }
            result = response.json::<CompletionResponse>() => {
                result.map_err(|e| ProviderError::from_reqwest(self.provider, e))?
            }
        };
        Ok(ChatResponse::Complete(completion.into_text()))
    }
}
