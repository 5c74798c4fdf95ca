use std::sync::Arc;

use serde::Serialize;

use super::cache::FlowCache;
use super::client::TextCompletion;
use super::contract::{extract_json_object, Flow, Validate};
use super::FlowError;

/// Result of a flow that degrades instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowOutcome<T> {
    Completed { result: T },
    Fallback { message: String },
}

impl<T> FlowOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Composes flows with a completion backend and the response cache.
pub struct FlowRunner {
    client: Arc<dyn TextCompletion>,
    cache: FlowCache,
}

impl FlowRunner {
    pub fn new(client: Arc<dyn TextCompletion>, cache: FlowCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &FlowCache {
        &self.cache
    }

    /// Run a flow and return every failure to the caller.
    pub async fn run<F: Flow>(&self, flow: &F, input: &F::Input) -> Result<F::Output, FlowError> {
        input.validate().map_err(FlowError::InvalidInput)?;

        let prompt = flow.build_prompt(input);
        let response = self.client.complete(flow.system_prompt(), &prompt).await?;
        let json = extract_json_object(&response)?;
        let output: F::Output =
            serde_json::from_str(json).map_err(|e| FlowError::InvalidOutput(e.to_string()))?;
        output.validate().map_err(FlowError::InvalidOutput)?;

        Ok(output)
    }

    /// Run a flow; backend and output failures become the flow's fallback
    /// message. Invalid input is still an error.
    pub async fn run_or_fallback<F: Flow>(
        &self,
        flow: &F,
        input: &F::Input,
    ) -> Result<FlowOutcome<F::Output>, FlowError> {
        match self.run(flow, input).await {
            Ok(result) => Ok(FlowOutcome::Completed { result }),
            Err(e) if e.is_caller_error() => Err(e),
            Err(e) => {
                tracing::warn!(flow = F::NAME, error = %e, "Flow failed; returning fallback");
                Ok(FlowOutcome::Fallback {
                    message: flow.fallback_message().to_string(),
                })
            }
        }
    }

    /// Like `run_or_fallback`, serving and storing completed results in the
    /// cache when the flow provides a key. Fallbacks are never cached.
    pub async fn run_cached<F: Flow>(
        &self,
        flow: &F,
        input: &F::Input,
    ) -> Result<FlowOutcome<F::Output>, FlowError> {
        let Some(key) = flow.cache_key(input).map(|k| format!("{}:{k}", F::NAME)) else {
            return self.run_or_fallback(flow, input).await;
        };

        if let Some(hit) = self.cache.get(&key) {
            match serde_json::from_value::<F::Output>(hit) {
                Ok(result) => {
                    tracing::debug!(flow = F::NAME, "Flow cache hit");
                    return Ok(FlowOutcome::Completed { result });
                }
                Err(e) => tracing::warn!(flow = F::NAME, error = %e, "Discarding unreadable cache entry"),
            }
        }

        let outcome = self.run_or_fallback(flow, input).await?;
        if let FlowOutcome::Completed { result } = &outcome {
            match serde_json::to_value(result) {
                Ok(value) => self.cache.insert(key, value),
                Err(e) => tracing::warn!(flow = F::NAME, error = %e, "Could not cache flow result"),
            }
        }
        Ok(outcome)
    }
}
