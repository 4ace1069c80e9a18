//! Pre-dispatch request guards.
//!
//! Oversized text and blob parameters are rejected before any engine code
//! runs so a single request cannot wedge the worker.

use localretrieve_core::constants::{MAX_BLOB_PARAM_BYTES, MAX_TEXT_PARAM_CHARS};
use localretrieve_core::errors::{RetrieveResult, ValidationError};
use localretrieve_core::models::NewDocument;

use crate::rpc::{ParamValue, Request};

fn check_text(text: &str) -> RetrieveResult<()> {
    let len = text.chars().count();
    if len > MAX_TEXT_PARAM_CHARS {
        return Err(ValidationError::TextTooLarge {
            len,
            max: MAX_TEXT_PARAM_CHARS,
        }
        .into());
    }
    Ok(())
}

fn check_blob(blob: &[u8]) -> RetrieveResult<()> {
    if blob.len() > MAX_BLOB_PARAM_BYTES {
        return Err(ValidationError::BlobTooLarge {
            len: blob.len(),
            max: MAX_BLOB_PARAM_BYTES,
        }
        .into());
    }
    Ok(())
}

fn check_params(params: &[ParamValue]) -> RetrieveResult<()> {
    for param in params {
        match param {
            ParamValue::Text(text) => check_text(text)?,
            ParamValue::Blob(blob) => check_blob(blob)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_document(doc: &NewDocument) -> RetrieveResult<()> {
    check_text(&doc.content)?;
    if let Some(title) = &doc.title {
        check_text(title)?;
    }
    if let Some(metadata) = &doc.metadata {
        check_text(&metadata.to_string())?;
    }
    Ok(())
}

/// Validate a request before dispatch. Returns the validation error a host
/// gets back instead of a worker stall.
pub fn validate(request: &Request) -> RetrieveResult<()> {
    match request {
        Request::Exec { params, .. } | Request::Select { params, .. } => check_params(params),
        Request::BulkInsert { rows, .. } => {
            for row in rows {
                check_params(row)?;
            }
            Ok(())
        }
        Request::InsertDocumentWithEmbedding { document, .. }
        | Request::UpdateDocument { document, .. } => check_document(document),
        Request::BatchInsertDocuments { documents, .. } => {
            for doc in documents {
                check_document(doc)?;
            }
            Ok(())
        }
        Request::SearchText { text, .. }
        | Request::SearchSemantic { text, .. }
        | Request::EnqueueEmbedding { text, .. }
        | Request::GenerateQueryEmbedding { text, .. } => check_text(text),
        Request::BatchGenerateQueryEmbeddings { texts, .. }
        | Request::WarmEmbeddingCache { texts, .. } => {
            for text in texts {
                check_text(text)?;
            }
            Ok(())
        }
        Request::Search { request } | Request::SearchAdvanced { request } => {
            if let Some(text) = &request.query.text {
                check_text(text)?;
            }
            Ok(())
        }
        Request::EnhanceQuery { query, .. } => check_text(query),
        Request::CallLlm { prompt, .. } => check_text(prompt),
        Request::SummarizeResults { query, .. } => check_text(query),
        // Database images are legitimately larger than the blob parameter
        // cap; the durability layer owns their limits.
        _ => Ok(()),
    }
}
