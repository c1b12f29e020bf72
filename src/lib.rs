pub mod config;
pub mod evaluation;
pub mod ledger;
pub mod narration;
pub mod session;
pub mod transcript;

pub use config::Config;
pub use evaluation::{CompletionService, EvaluationClient, EvaluationResult, ServiceError};
pub use ledger::{AnswerLedger, HttpLedger, LedgerError, LedgerKind, MemoryLedger, PersistedAnswer};
pub use narration::Narrator;
pub use session::{Question, SessionController, SessionError, SessionState, SessionSummary};
pub use transcript::{CaptureError, InputMode, TranscriptSnapshot, TranscriptSource};
