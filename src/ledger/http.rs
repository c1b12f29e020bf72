use chrono::{DateTime, Utc};
use log::{error, info};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnswerLedger, LedgerError, PersistedAnswer, Result};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveAnswerBody<'a> {
    interview_id: Uuid,
    question_id: Uuid,
    question: &'a str,
    reference_answer: &'a str,
    candidate_answer: &'a str,
    feedback: &'a str,
    rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAnswerRecord {
    interview_id: Uuid,
    question_id: Uuid,
    question: String,
    #[serde(default)]
    reference_answer: String,
    #[serde(default)]
    candidate_answer: String,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    rating: u8,
    created_at: DateTime<Utc>,
}

impl From<StoredAnswerRecord> for PersistedAnswer {
    fn from(record: StoredAnswerRecord) -> Self {
        PersistedAnswer {
            session_id: record.interview_id,
            question_id: record.question_id,
            question_text: record.question,
            reference_answer: record.reference_answer,
            candidate_answer: record.candidate_answer,
            feedback: record.feedback,
            rating: record.rating,
            created_at: record.created_at,
        }
    }
}

/// REST client for the answer persistence collaborator.
///
/// Requires a bearer credential up front; without one every call fails fast
/// with a typed auth error instead of reaching the network.
pub struct HttpLedger {
    client: Client,
    base_url: String,
    token: Option<String>,
    user_id: Option<String>,
}

impl HttpLedger {
    pub fn new(base_url: String, token: Option<String>, user_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url,
            token,
            user_id,
        }
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(LedgerError::Auth)
    }

    async fn fetch_records(&self, session_id: Uuid) -> Result<Vec<StoredAnswerRecord>> {
        let token = self.token()?;
        let response = self
            .client
            .get(format!("{}/interview/{}/answers", self.base_url, session_id))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(LedgerError::Auth),
            status if !status.is_success() => {
                error!("answer history fetch failed with HTTP {}", status);
                return Err(LedgerError::Persistence(format!("HTTP {}", status)));
            }
            _ => {}
        }

        response
            .json::<Vec<StoredAnswerRecord>>()
            .await
            .map_err(|e| LedgerError::InvalidRecord(e.to_string()))
    }
}

impl AnswerLedger for HttpLedger {
    async fn exists(&self, session_id: Uuid, question_id: Uuid) -> Result<bool> {
        let records = self.fetch_records(session_id).await?;
        Ok(records.iter().any(|r| r.question_id == question_id))
    }

    async fn save(&self, answer: &PersistedAnswer) -> Result<()> {
        let token = self.token()?;
        let body = SaveAnswerBody {
            interview_id: answer.session_id,
            question_id: answer.question_id,
            question: &answer.question_text,
            reference_answer: &answer.reference_answer,
            candidate_answer: &answer.candidate_answer,
            feedback: &answer.feedback,
            rating: answer.rating,
            user_id: self.user_id.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/interview/answers", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LedgerError::Auth),
            StatusCode::CONFLICT => Err(LedgerError::Duplicate),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                error!("answer save failed with HTTP {}: {}", status, body);
                Err(LedgerError::Persistence(format!("HTTP {}", status)))
            }
            _ => {
                info!(
                    "answer persisted for question {} in session {}",
                    answer.question_id, answer.session_id
                );
                Ok(())
            }
        }
    }

    async fn list(&self, session_id: Uuid) -> Result<Vec<PersistedAnswer>> {
        let mut answers: Vec<PersistedAnswer> = self
            .fetch_records(session_id)
            .await?
            .into_iter()
            .map(PersistedAnswer::from)
            .collect();
        answers.sort_by_key(|a| a.created_at);
        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_fails_fast_without_network() {
        let ledger = HttpLedger::new("http://localhost:3000/api".to_string(), None, None);
        assert!(matches!(
            ledger.exists(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(LedgerError::Auth)
        ));
        let answer = PersistedAnswer {
            session_id: Uuid::new_v4(),
            question_id: Uuid::new_v4(),
            question_text: String::new(),
            reference_answer: String::new(),
            candidate_answer: String::new(),
            feedback: String::new(),
            rating: 5,
            created_at: Utc::now(),
        };
        assert!(matches!(ledger.save(&answer).await, Err(LedgerError::Auth)));
    }

    #[test]
    fn stored_record_maps_onto_persisted_answer() {
        let record: StoredAnswerRecord = serde_json::from_str(
            r#"{
                "interviewId": "7f2c1b9e-95a7-4f0b-8a21-3a55a87de001",
                "questionId": "7f2c1b9e-95a7-4f0b-8a21-3a55a87de002",
                "question": "What is a mutex?",
                "referenceAnswer": "A mutual-exclusion lock.",
                "candidateAnswer": "A lock that only one thread can hold.",
                "feedback": "Correct.",
                "rating": 9,
                "createdAt": "2024-05-01T10:00:00Z"
            }"#,
        )
        .unwrap();
        let answer = PersistedAnswer::from(record);
        assert_eq!(answer.question_text, "What is a mutex?");
        assert_eq!(answer.rating, 9);
    }
}
