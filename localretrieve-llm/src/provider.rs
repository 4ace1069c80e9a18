//! Provider variants and per-call options.

use serde::{Deserialize, Serialize};

use localretrieve_core::errors::{LlmError, RetrieveResult};

/// The closed set of provider variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    OpenAi,
    Anthropic,
    OpenRouter,
    Custom,
}

impl LlmProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::OpenRouter => "openrouter",
            Self::Custom => "custom",
        }
    }

    /// Built-in endpoint for the hosted variants; `Custom` requires one.
    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1/chat/completions"),
            Self::Anthropic => Some("https://api.anthropic.com/v1/messages"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1/chat/completions"),
            Self::Custom => None,
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

/// Per-call options. The API key is supplied here, never persisted, and
/// redacted from Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmCallOptions {
    pub provider: LlmProviderKind,
    pub model: String,
    pub api_key: String,
    /// Required for `Custom`; overrides the default for the rest.
    pub endpoint: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Ask for a JSON response mode where the provider supports one.
    #[serde(default)]
    pub json_mode: bool,
    /// Optional OpenRouter attribution headers.
    pub referer: Option<String>,
    pub title: Option<String>,
    /// Per-call override of the configured timeout.
    pub timeout_ms: Option<u64>,
}

impl LlmCallOptions {
    pub fn new(provider: LlmProviderKind, model: &str, api_key: &str) -> Self {
        Self {
            provider,
            model: model.to_string(),
            api_key: api_key.to_string(),
            endpoint: None,
            max_tokens: None,
            temperature: None,
            json_mode: false,
            referer: None,
            title: None,
            timeout_ms: None,
        }
    }

    /// Validate the option set before any network traffic.
    pub fn validate(&self) -> RetrieveResult<()> {
        if self.model.is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "model must be set".to_string(),
            }
            .into());
        }
        if self.api_key.is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "api key must be set".to_string(),
            }
            .into());
        }
        if self.provider == LlmProviderKind::Custom && self.endpoint.is_none() {
            return Err(LlmError::InvalidConfig {
                reason: "custom provider requires an endpoint".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn resolved_endpoint(&self) -> RetrieveResult<String> {
        self.endpoint
            .clone()
            .or_else(|| self.provider.default_endpoint().map(str::to_string))
            .ok_or_else(|| {
                LlmError::InvalidConfig {
                    reason: "no endpoint available".to_string(),
                }
                .into()
            })
    }
}

impl std::fmt::Debug for LlmCallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCallOptions")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("json_mode", &self.json_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_without_endpoint_is_invalid() {
        let opts = LlmCallOptions::new(LlmProviderKind::Custom, "m", "k");
        assert!(opts.validate().is_err());
    }

    #[test]
    fn empty_key_is_invalid() {
        let opts = LlmCallOptions::new(LlmProviderKind::OpenAi, "gpt-4o-mini", "");
        assert!(opts.validate().is_err());
    }

    #[test]
    fn debug_redacts_the_key() {
        let opts = LlmCallOptions::new(LlmProviderKind::OpenAi, "gpt-4o-mini", "sk-secret");
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
