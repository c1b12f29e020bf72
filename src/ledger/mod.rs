pub mod http;
pub mod memory;

pub use http::HttpLedger;
pub use memory::MemoryLedger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("no persistence credential is available")]
    Auth,
    #[error("an answer for this question is already saved")]
    Duplicate,
    #[error("failed to persist answer: {0}")]
    Persistence(String),
    #[error("stored answer record is malformed: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Write-once record of one evaluated answer. At most one exists per
/// (session, question) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAnswer {
    pub session_id: Uuid,
    pub question_id: Uuid,
    pub question_text: String,
    pub reference_answer: String,
    pub candidate_answer: String,
    pub feedback: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}

/// Persistence-facing component enforcing one answer per question.
///
/// Callers must check `exists` before `save` and skip the write on a hit;
/// the storage tier's own uniqueness guarantees are outside this
/// subsystem's control, so the pre-write check is the contract.
pub trait AnswerLedger {
    fn exists(
        &self,
        session_id: Uuid,
        question_id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn save(
        &self,
        answer: &PersistedAnswer,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn list(
        &self,
        session_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<PersistedAnswer>>> + Send;
}

/// Runtime choice between the REST collaborator and the in-memory store,
/// picked by the binary from configuration.
pub enum LedgerKind {
    Http(HttpLedger),
    Memory(MemoryLedger),
}

impl AnswerLedger for LedgerKind {
    async fn exists(&self, session_id: Uuid, question_id: Uuid) -> Result<bool> {
        match self {
            LedgerKind::Http(ledger) => ledger.exists(session_id, question_id).await,
            LedgerKind::Memory(ledger) => ledger.exists(session_id, question_id).await,
        }
    }

    async fn save(&self, answer: &PersistedAnswer) -> Result<()> {
        match self {
            LedgerKind::Http(ledger) => ledger.save(answer).await,
            LedgerKind::Memory(ledger) => ledger.save(answer).await,
        }
    }

    async fn list(&self, session_id: Uuid) -> Result<Vec<PersistedAnswer>> {
        match self {
            LedgerKind::Http(ledger) => ledger.list(session_id).await,
            LedgerKind::Memory(ledger) => ledger.list(session_id).await,
        }
    }
}
