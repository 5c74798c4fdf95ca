use serde::de::DeserializeOwned;
use serde::Serialize;

use super::FlowError;

/// Boundary check for flow inputs and outputs.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// A named request/response unit over a text-completion backend.
pub trait Flow: Send + Sync {
    const NAME: &'static str;

    type Input: Validate + Send + Sync;
    type Output: Validate + Serialize + DeserializeOwned + Clone + Send;

    fn system_prompt(&self) -> &str;

    fn build_prompt(&self, input: &Self::Input) -> String;

    /// Neutral text shown when the backend cannot produce an answer.
    fn fallback_message(&self) -> &'static str;

    /// Key for the response cache; `None` disables caching for this input.
    fn cache_key(&self, _input: &Self::Input) -> Option<String> {
        None
    }
}

/// Extract the JSON object from a completion that may wrap it in prose or
/// a fenced code block.
pub fn extract_json_object(response: &str) -> Result<&str, FlowError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') {
                return Ok(block);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(FlowError::MissingJson),
    }
}

/// Require a non-blank string field.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

/// Require at most `max` characters.
pub(crate) fn limit_text(field: &str, value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        Err(format!("{field} must be at most {max} characters"))
    } else {
        Ok(())
    }
}
