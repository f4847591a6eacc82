//! [`Backend`] implementation over HTTP.

use async_trait::async_trait;
use pipeline::{Backend, BackendError, BackendRequest, BackendResponse};
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::wire::{build_body, classify_status, parse_response, parse_retry_after};
use crate::ProviderError;

/// Talks to an OpenAI-compatible `/chat/completions` endpoint.
///
/// One instance serves every worker; the model and sampling settings travel
/// with each request.
#[derive(Debug, Clone)]
pub struct ChatCompletionsBackend {
    client: Client,
    config: ProviderConfig,
}

impl ChatCompletionsBackend {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let base = config.api_base.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ProviderError::InvalidApiBase(config.api_base.clone()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for ChatCompletionsBackend {
    async fn complete(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        let body = build_body(request);
        debug!(
            task = %request.task,
            model = %request.model,
            exchanges = request.exchanges.len(),
            tools = request.tools.len(),
            "Sending chat completion request"
        );

        let mut builder = self.client.post(self.config.completions_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let error = classify_status(status.as_u16(), retry_after, &text);
            warn!(task = %request.task, status = status.as_u16(), error = %error, "Chat completion failed");
            return Err(error);
        }

        parse_response(&text)
    }
}

/// Connection failures and timeouts are transient; a request that could not
/// even be built is not.
fn transport_error(error: reqwest::Error) -> BackendError {
    if error.is_builder() {
        BackendError::rejected(error.to_string())
    } else {
        BackendError::unavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_api_base() {
        let err = ChatCompletionsBackend::new(ProviderConfig::new("api.openai.com/v1")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidApiBase(_)));
    }

    #[test]
    fn test_builds_with_local_base() {
        let backend = ChatCompletionsBackend::new(ProviderConfig::new("http://127.0.0.1:11434/v1")).unwrap();
        assert_eq!(
            backend.config().completions_url(),
            "http://127.0.0.1:11434/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        // Port 9 (discard) is not expected to accept HTTP on loopback.
        let backend = ChatCompletionsBackend::new(
            ProviderConfig::new("http://127.0.0.1:9/v1")
                .with_request_timeout(std::time::Duration::from_secs(2)),
        )
        .unwrap();
        let request = BackendRequest {
            task: pipeline::TaskId::new("t1").unwrap(),
            worker: pipeline::WorkerId::new("w").unwrap(),
            model: "m".into(),
            temperature: 0.0,
            max_tokens: None,
            role: "r".into(),
            goal: "g".into(),
            backstory: String::new(),
            description: "d".into(),
            expected_output: String::new(),
            context: Vec::new(),
            tools: Vec::new(),
            exchanges: Vec::new(),
        };

        assert!(matches!(
            backend.complete(&request).await,
            Err(BackendError::Unavailable { .. })
        ));
    }
}
