//! Structured AI flows.
//!
//! A flow validates its input, prompts a text-completion backend, extracts
//! the JSON object from the reply and validates it against the flow's
//! output type. Backend failures become a neutral fallback message unless
//! the caller asks for the hard error.

pub mod cache;
pub mod client;
pub mod contract;
pub mod runner;
pub mod symptom_check;
pub mod wellness_tip;

use thiserror::Error;

pub use cache::FlowCache;
pub use client::{HttpCompletionClient, TextCompletion};
pub use contract::{extract_json_object, Flow, Validate};
pub use runner::{FlowOutcome, FlowRunner};
pub use symptom_check::{SymptomCheckFlow, SymptomCheckInput, SymptomCheckOutput};
pub use wellness_tip::{WellnessTipFlow, WellnessTipInput, WellnessTipOutput};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Completion backend unreachable at {0}")]
    Connection(String),

    #[error("Completion transport error: {0}")]
    Transport(String),

    #[error("Completion backend error ({status}): {body}")]
    Backend { status: u16, body: String },

    #[error("No JSON object in completion")]
    MissingJson,

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

impl FlowError {
    /// Errors the caller caused; never replaced by a fallback.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
