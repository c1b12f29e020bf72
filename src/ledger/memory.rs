use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use super::{AnswerLedger, LedgerError, PersistedAnswer, Result};

/// In-memory answer store, used for tests and for offline rehearsal when no
/// persistence credential is configured. Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    records: Arc<Mutex<HashMap<(Uuid, Uuid), PersistedAnswer>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AnswerLedger for MemoryLedger {
    async fn exists(&self, session_id: Uuid, question_id: Uuid) -> Result<bool> {
        Ok(self.records.lock().contains_key(&(session_id, question_id)))
    }

    async fn save(&self, answer: &PersistedAnswer) -> Result<()> {
        let mut records = self.records.lock();
        let key = (answer.session_id, answer.question_id);
        // Second line of defense behind the caller's pre-write check.
        if records.contains_key(&key) {
            return Err(LedgerError::Duplicate);
        }
        records.insert(key, answer.clone());
        Ok(())
    }

    async fn list(&self, session_id: Uuid) -> Result<Vec<PersistedAnswer>> {
        let mut answers: Vec<PersistedAnswer> = self
            .records
            .lock()
            .values()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.created_at);
        Ok(answers)
    }
}
