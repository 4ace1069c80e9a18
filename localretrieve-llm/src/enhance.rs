//! Query enhancement and result summarization prompts, with strict-JSON
//! response parsing.

use serde::{Deserialize, Serialize};

use localretrieve_core::errors::{LlmError, RetrieveResult};
use localretrieve_core::models::SearchHit;

use crate::client::{LlmClient, LlmResponse};
use crate::provider::LlmCallOptions;

/// Model output of `enhance_query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedQuery {
    pub enhanced_query: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Model output of `summarize_results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Ask the model to rewrite a search query for better recall.
pub async fn enhance_query(
    client: &LlmClient,
    query: &str,
    opts: &LlmCallOptions,
) -> RetrieveResult<EnhancedQuery> {
    let mut opts = opts.clone();
    opts.json_mode = true;
    let prompt = enhance_prompt(query);
    let response = client.call(&prompt, &opts).await?;
    parse_json_payload(&response)
}

/// Ask the model for a short synthesis of a result set.
pub async fn summarize_results(
    client: &LlmClient,
    query: &str,
    results: &[SearchHit],
    opts: &LlmCallOptions,
) -> RetrieveResult<ResultSummary> {
    let mut opts = opts.clone();
    opts.json_mode = true;
    let prompt = summarize_prompt(query, results);
    let response = client.call(&prompt, &opts).await?;
    parse_json_payload(&response)
}

fn enhance_prompt(query: &str) -> String {
    format!(
        "You improve search queries for a hybrid keyword+vector document \
         search engine. Rewrite the query for better recall without \
         changing its meaning.\n\
         Query: {query}\n\
         Respond with strict JSON only, no prose, exactly this shape:\n\
         {{\"enhancedQuery\": string, \"suggestions\": [string], \
         \"intent\": string, \"confidence\": number}}"
    )
}

fn summarize_prompt(query: &str, results: &[SearchHit]) -> String {
    let mut corpus = String::new();
    for (i, hit) in results.iter().take(10).enumerate() {
        let title = hit.title.as_deref().unwrap_or("(untitled)");
        let snippet: String = hit.content.chars().take(500).collect();
        corpus.push_str(&format!("[{i}] {title}: {snippet}\n"));
    }
    format!(
        "Summarize these search results for the query \"{query}\".\n\
         {corpus}\
         Respond with strict JSON only, no prose, exactly this shape:\n\
         {{\"summary\": string, \"keyPoints\": [string], \
         \"themes\": [string], \"confidence\": number}}"
    )
}

/// Parse the model's text as strict JSON, tolerating a fenced code block.
/// Failures surface as `Parse` errors carrying the raw text.
fn parse_json_payload<T: serde::de::DeserializeOwned>(
    response: &LlmResponse,
) -> RetrieveResult<T> {
    let text = strip_code_fence(response.text.trim());
    serde_json::from_str(text).map_err(|_| {
        LlmError::Parse {
            raw: response.text.clone(),
        }
        .into()
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FinishReason;
    use localretrieve_core::errors::RetrieveError;

    fn response(text: &str) -> LlmResponse {
        LlmResponse {
            text: text.to_string(),
            finish_reason: FinishReason::Stop,
            usage: None,
            model: "test".to_string(),
            provider: "openai".to_string(),
        }
    }

    #[test]
    fn strict_json_parses() {
        let parsed: EnhancedQuery = parse_json_payload(&response(
            r#"{"enhancedQuery": "ai artificial intelligence", "suggestions": ["ml"], "intent": "informational", "confidence": 0.9}"#,
        ))
        .unwrap();
        assert_eq!(parsed.enhanced_query, "ai artificial intelligence");
        assert_eq!(parsed.suggestions, vec!["ml"]);
        assert!((parsed.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn fenced_json_parses() {
        let parsed: ResultSummary = parse_json_payload(&response(
            "```json\n{\"summary\": \"three documents about AI\", \"keyPoints\": [], \"themes\": [\"ai\"], \"confidence\": 0.7}\n```",
        ))
        .unwrap();
        assert_eq!(parsed.summary, "three documents about AI");
        assert_eq!(parsed.themes, vec!["ai"]);
    }

    #[test]
    fn optional_fields_default() {
        let parsed: EnhancedQuery =
            parse_json_payload(&response(r#"{"enhancedQuery": "q"}"#)).unwrap();
        assert!(parsed.suggestions.is_empty());
        assert!(parsed.intent.is_none());
        assert_eq!(parsed.confidence, 0.0);
    }

    #[test]
    fn prose_answer_is_a_parse_error_with_raw_text() {
        let err = parse_json_payload::<EnhancedQuery>(&response(
            "Sure! Here is a better query: AI and machine learning",
        ))
        .unwrap_err();
        match err {
            RetrieveError::Llm(LlmError::Parse { raw }) => {
                assert!(raw.contains("Sure!"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn summarize_prompt_clips_long_content() {
        let hits = vec![SearchHit {
            id: "a".to_string(),
            title: None,
            content: "x".repeat(5000),
            metadata: None,
            score: 1.0,
            fts_score: None,
            vec_score: None,
            rowid: Some(1),
        }];
        let prompt = summarize_prompt("query", &hits);
        assert!(prompt.len() < 2000);
        assert!(prompt.contains("keyPoints"));
    }
}
