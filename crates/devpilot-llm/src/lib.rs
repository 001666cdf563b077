//! DevPilot LLM providers.
//!
//! This crate turns an ordered list of conversation messages into a call
//! against a language model backend and exposes the answer either as a
//! complete string or as a streaming [`ChatHandle`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use devpilot_core::Message;
//! use devpilot_llm::{build_provider, ChatOptions, ChatResponse, ProviderConfig, StaticCredentials};
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = build_provider(
//!         &ProviderConfig::default(),
//!         Arc::new(StaticCredentials::default()),
//!     )?;
//!
//!     let response = provider
//!         .chat(&[Message::user("What is 2 + 2?")], ChatOptions::default())
//!         .await?;
//!
//!     if let ChatResponse::Streaming(handle) = response {
//!         println!("{}", handle.result().await?);
//!     }
//!     Ok(())
//! }
//! ```

mod collect;
pub mod config;
pub mod credentials;
pub mod encode;
pub mod error;
pub mod handle;
pub mod mask;
pub mod provider;
pub mod providers;
pub mod sse;
pub mod wire;

pub use config::ProviderConfig;
pub use credentials::{Credentials, CredentialsSource, StaticCredentials};
pub use error::{ProviderError, StreamError};
pub use handle::{ChatEvent, ChatHandle, ChatSender, Interrupter};
pub use mask::mask_sensitive;
pub use provider::{build_provider, ChatOptions, ChatResponse, LlmProvider, ProviderKind};
pub use sse::{read_event_stream, SseDecoder, SseFrame, StreamHandler, StreamOutcome};
