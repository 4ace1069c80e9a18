/// LLM bridge errors.
///
/// 4xx and config errors are non-retryable; 5xx and network errors are.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("invalid LLM configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("LLM request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("failed to parse model output as JSON: {raw}")]
    Parse { raw: String },

    #[error("LLM network error: {reason}")]
    Network { reason: String },
}

impl LlmError {
    pub fn retryable(&self) -> bool {
        match self {
            Self::Provider { status, .. } => *status >= 500,
            Self::Network { .. } => true,
            Self::InvalidConfig { .. } | Self::Timeout { .. } | Self::Parse { .. } => false,
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "check the provider configuration and API key",
            Self::Provider { status, .. } if *status == 401 || *status == 403 => {
                "check the API key"
            }
            Self::Provider { .. } => "retry later or switch providers",
            Self::Timeout { .. } => "retry, or raise the LLM timeout",
            Self::Parse { .. } => "retry; the model returned malformed JSON",
            Self::Network { .. } => "check connectivity and retry",
        }
    }
}
