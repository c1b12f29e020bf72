pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionSummary};
pub use state::{SessionEvent, SessionState};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;
use crate::transcript::{CaptureError, InputMode};

/// Candidate answers shorter than this are rejected back into
/// `AwaitingAnswer` with a visible reason, never silently evaluated.
pub const MIN_ANSWER_CHARS: usize = 30;

/// One rehearsal question with its reference answer. Immutable once the
/// session starts; supplied by the question-generation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub reference_answer: String,
}

impl Question {
    pub fn new(text: impl Into<String>, reference_answer: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            reference_answer: reference_answer.into(),
        }
    }
}

/// Transient answer state while a question is active. Destroyed on submit
/// or abandon.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDraft {
    pub question_id: Uuid,
    pub captured_text: String,
    pub input_mode: InputMode,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("answer is too short: {got} characters (minimum {min})")]
    SubmissionRejected { got: usize, min: usize },
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("this question already has a saved answer")]
    DuplicateAnswer,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("{operation} is not allowed while the session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },
}
