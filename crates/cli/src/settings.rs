//! Engine settings file.
//!
//! ```json
//! {
//!   "runner":   { "call_timeout_ms": 120000, "retry": { "max_retries": 3 } },
//!   "provider": { "api_base": "https://api.novita.ai/v3/openai" }
//! }
//! ```
//!
//! Every field is optional. Command-line flags override the provider section.

use std::path::Path;

use anyhow::{Context, Result};
use llm::ProviderConfig;
use runner::RunnerConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub runner: RunnerConfig,
    pub provider: ProviderConfig,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Applies `--api-base` / `--api-key`.
    pub fn with_overrides(mut self, api_base: Option<String>, api_key: Option<String>) -> Self {
        if let Some(base) = api_base {
            self.provider.api_base = base;
        }
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }
        self
    }
}
