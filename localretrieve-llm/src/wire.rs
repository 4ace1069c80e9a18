//! Wire bodies and response parsing, per provider family.
//!
//! OpenAI, OpenRouter, and custom endpoints speak chat-completions;
//! Anthropic speaks the messages schema. Authorization rides a bearer
//! header except for Anthropic's `x-api-key` + version header pair.

use serde_json::Value;

use localretrieve_core::errors::{LlmError, RetrieveResult};

use crate::provider::{FinishReason, LlmCallOptions, LlmProviderKind};
use crate::LlmUsage;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Headers as `(name, value)` pairs; values may hold credentials and must
/// not be logged.
pub fn build_headers(opts: &LlmCallOptions) -> Vec<(String, String)> {
    let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
    match opts.provider {
        LlmProviderKind::Anthropic => {
            headers.push(("x-api-key".to_string(), opts.api_key.clone()));
            headers.push(("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()));
        }
        _ => {
            headers.push((
                "authorization".to_string(),
                format!("Bearer {}", opts.api_key),
            ));
        }
    }
    if opts.provider == LlmProviderKind::OpenRouter {
        if let Some(referer) = &opts.referer {
            headers.push(("HTTP-Referer".to_string(), referer.clone()));
        }
        if let Some(title) = &opts.title {
            headers.push(("X-Title".to_string(), title.clone()));
        }
    }
    headers
}

/// The provider-native JSON request body for a single-prompt call.
pub fn build_body(prompt: &str, opts: &LlmCallOptions) -> Value {
    match opts.provider {
        LlmProviderKind::Anthropic => {
            let mut body = serde_json::json!({
                "model": opts.model,
                "max_tokens": opts.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                "messages": [{"role": "user", "content": prompt}],
            });
            if let Some(t) = opts.temperature {
                body["temperature"] = serde_json::json!(t);
            }
            body
        }
        _ => {
            let mut body = serde_json::json!({
                "model": opts.model,
                "messages": [{"role": "user", "content": prompt}],
            });
            if let Some(max) = opts.max_tokens {
                body["max_tokens"] = serde_json::json!(max);
            }
            if let Some(t) = opts.temperature {
                body["temperature"] = serde_json::json!(t);
            }
            if opts.json_mode {
                body["response_format"] = serde_json::json!({"type": "json_object"});
            }
            body
        }
    }
}

/// Parsed text + finish reason + usage from a provider response body.
#[derive(Debug)]
pub struct ParsedResponse {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<LlmUsage>,
}

pub fn parse_response(kind: LlmProviderKind, body: &str) -> RetrieveResult<ParsedResponse> {
    let value: Value = serde_json::from_str(body).map_err(|_| LlmError::Parse {
        raw: clip(body),
    })?;
    match kind {
        LlmProviderKind::Anthropic => parse_anthropic(&value, body),
        _ => parse_chat_completions(&value, body),
    }
}

fn parse_chat_completions(value: &Value, raw: &str) -> RetrieveResult<ParsedResponse> {
    let choice = value
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| LlmError::Parse { raw: clip(raw) })?;
    let text = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::Parse { raw: clip(raw) })?
        .to_string();
    let finish_reason = match choice.get("finish_reason").and_then(Value::as_str) {
        Some("length") => FinishReason::Length,
        _ => FinishReason::Stop,
    };
    let usage = value.get("usage").map(|u| LlmUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        completion_tokens: u
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    });
    Ok(ParsedResponse {
        text,
        finish_reason,
        usage,
    })
}

fn parse_anthropic(value: &Value, raw: &str) -> RetrieveResult<ParsedResponse> {
    let text = value
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::Parse { raw: clip(raw) })?
        .to_string();
    let finish_reason = match value.get("stop_reason").and_then(Value::as_str) {
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Stop,
    };
    let usage = value.get("usage").map(|u| LlmUsage {
        prompt_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        completion_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
    });
    Ok(ParsedResponse {
        text,
        finish_reason,
        usage,
    })
}

/// Parse errors carry the raw text, clipped to keep envelopes small.
fn clip(raw: &str) -> String {
    const MAX: usize = 2048;
    if raw.len() <= MAX {
        raw.to_string()
    } else {
        let mut end = MAX;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        raw[..end].to_string()
    }
}
