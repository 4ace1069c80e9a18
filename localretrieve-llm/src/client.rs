//! The HTTP client: timeout, exponential retry, error categorization.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use localretrieve_core::config::LlmConfig;
use localretrieve_core::errors::{LlmError, RetrieveResult};

use crate::provider::{FinishReason, LlmCallOptions};
use crate::wire;

/// Token accounting as reported by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A completed LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<LlmUsage>,
    pub model: String,
    pub provider: String,
}

/// Provider-agnostic chat client. One per worker; providers are chosen
/// per call.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Issue a single-prompt call with retries.
    ///
    /// Non-retryable: config errors, timeouts, HTTP < 500. Retryable with
    /// `2^n · 1s` backoff: 5xx and transport errors.
    pub async fn call(&self, prompt: &str, opts: &LlmCallOptions) -> RetrieveResult<LlmResponse> {
        opts.validate()?;
        let endpoint = opts.resolved_endpoint()?;
        let timeout = Duration::from_millis(opts.timeout_ms.unwrap_or(self.config.timeout_ms));
        let max_retries = self.config.max_retries;

        let mut attempt = 0u32;
        loop {
            match self.send_once(prompt, opts, &endpoint, timeout).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable = matches!(
                        &e,
                        localretrieve_core::RetrieveError::Llm(inner) if inner.retryable()
                    );
                    if retryable && attempt < max_retries {
                        let backoff = Duration::from_secs(1u64 << attempt);
                        warn!(
                            attempt,
                            backoff_s = backoff.as_secs(),
                            error = %e,
                            "LLM call failed, retrying"
                        );
                        tokio::time::sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        prompt: &str,
        opts: &LlmCallOptions,
        endpoint: &str,
        timeout: Duration,
    ) -> RetrieveResult<LlmResponse> {
        let body = wire::build_body(prompt, opts);
        let mut request = self.http.post(endpoint).timeout(timeout).json(&body);
        for (name, value) in wire::build_headers(opts) {
            request = request.header(name.as_str(), value.as_str());
        }

        let timeout_ms = timeout.as_millis() as u64;
        let response = request
            .send()
            .await
            .map_err(|e| categorize_transport(&e, timeout_ms))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| categorize_transport(&e, timeout_ms))?;

        if !status.is_success() {
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message: clip_message(&text),
            }
            .into());
        }

        let parsed = wire::parse_response(opts.provider, &text)?;
        debug!(
            provider = opts.provider.as_str(),
            model = %opts.model,
            finish = ?parsed.finish_reason,
            "LLM call complete"
        );
        Ok(LlmResponse {
            text: parsed.text,
            finish_reason: parsed.finish_reason,
            usage: parsed.usage,
            model: opts.model.clone(),
            provider: opts.provider.as_str().to_string(),
        })
    }
}

fn categorize_transport(e: &reqwest::Error, timeout_ms: u64) -> localretrieve_core::RetrieveError {
    if e.is_timeout() {
        LlmError::Timeout { ms: timeout_ms }.into()
    } else {
        LlmError::Network {
            reason: e.to_string(),
        }
        .into()
    }
}

fn clip_message(text: &str) -> String {
    const MAX: usize = 512;
    if text.len() <= MAX {
        text.to_string()
    } else {
        let mut end = MAX;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}
