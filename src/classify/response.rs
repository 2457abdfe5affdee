// file: src/classify/response.rs
// description: tolerant parsing of the model's JSON classification reply
// reference: models wrap JSON in prose or code fences despite instructions

use crate::error::{PipelineError, Result};
use crate::models::Classification;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawClassification {
    category: String,
    summary: String,
    #[serde(default)]
    key_features: Vec<String>,
}

/// Extract a `Classification` from the model reply. Tries the raw text, then
/// a ```json fence, then the outermost brace span.
pub fn parse_reply(reply: &str) -> Result<Classification> {
    let candidates = [
        Some(reply.trim()),
        extract_fenced(reply),
        extract_braced(reply),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(raw) = serde_json::from_str::<RawClassification>(candidate) {
            return Ok(Classification {
                category: raw.category.trim().to_string(),
                summary: raw.summary.trim().to_string(),
                key_features: raw.key_features,
            });
        }
    }

    Err(PipelineError::MalformedResponse(format!(
        "no JSON classification in model reply: {}",
        reply.chars().take(120).collect::<String>()
    )))
}

fn extract_fenced(reply: &str) -> Option<&str> {
    let after = reply.split_once("```json")?.1;
    Some(after.split_once("```")?.0.trim())
}

fn extract_braced(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
