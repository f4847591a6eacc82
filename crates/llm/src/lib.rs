//! Crewline backend infrastructure adapter.
//!
//! Implements the [`pipeline::Backend`] trait for any service speaking the
//! OpenAI chat-completions protocol (hosted OpenAI, Azure-style gateways,
//! local servers such as Ollama or vLLM). Other protocols are added as new
//! modules in this crate without any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, and status-code classification live here. The [`pipeline`] crate
//! sees only [`pipeline::Backend`]. Retries are the runner's concern: this
//! crate reports each failure once, classified as transient or not.

pub mod chat;
pub mod config;
pub mod wire;

use thiserror::Error;

pub use chat::ChatCompletionsBackend;
pub use config::ProviderConfig;

/// Failure constructing a backend client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The configured API base is not an absolute http(s) URL.
    #[error("Invalid API base '{0}'")]
    InvalidApiBase(String),

    /// The HTTP client could not be built (e.g. TLS initialisation failed).
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
