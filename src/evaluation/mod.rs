pub mod client;
pub mod prompt;
pub mod repair;

pub use client::EvaluationClient;
pub use prompt::build_prompt;
pub use repair::repair_evaluation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("the evaluation service returned no usable text")]
    EmptyResponse,
    #[error("the evaluation service refused this content: {0}")]
    ContentBlocked(String),
    #[error("the evaluation service's reply was cut off before completion")]
    TruncatedResponse,
    #[error("evaluation request failed: {0}")]
    TransportError(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// The quality verdict shown to the candidate. Either fully recovered from
/// the service's reply or replaced by a safe fallback - never partially
/// valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub rating: u8,
    pub feedback: String,
}

impl EvaluationResult {
    /// Substituted when the service replied but nothing usable could be
    /// recovered from the reply.
    pub fn unparsable_fallback() -> Self {
        Self {
            rating: 5,
            feedback: "Automatic evaluation could not read the reviewer's response. \
                       Your answer was recorded as-is; submit it again to request a fresh evaluation."
                .to_string(),
        }
    }

    /// Substituted when the service call itself failed. Rating 0 signals
    /// that no evaluation happened at all.
    pub fn service_failure(error: &ServiceError) -> Self {
        Self {
            rating: 0,
            feedback: format!(
                "Automatic evaluation was not available for this answer ({}). \
                 You can still save the answer and retry the evaluation later.",
                error
            ),
        }
    }
}

/// The single outbound call to the language-model service: free-text prompt
/// in, raw completion text out. Implemented by `EvaluationClient` and by test
/// stubs; no JSON interpretation happens behind this seam.
pub trait CompletionService {
    fn evaluate(&self, prompt: &str) -> impl std::future::Future<Output = Result<String>> + Send;
}
