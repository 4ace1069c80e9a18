//! # localretrieve-llm
//!
//! Unified client for chat-completion-style endpoints: OpenAI-compatible,
//! Anthropic-compatible, OpenRouter, and custom. Used for query
//! enhancement and result summarization; credentials live only for the
//! duration of a call.

pub mod client;
pub mod enhance;
pub mod provider;
pub mod wire;

pub use client::{LlmClient, LlmResponse, LlmUsage};
pub use enhance::{EnhancedQuery, ResultSummary};
pub use provider::{FinishReason, LlmCallOptions, LlmProviderKind};
