use std::collections::HashSet;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use super::state::{SessionEvent, SessionState};
use super::{AnswerDraft, Question, SessionError, MIN_ANSWER_CHARS};
use crate::evaluation::{build_prompt, repair_evaluation, CompletionService, EvaluationResult};
use crate::ledger::{AnswerLedger, LedgerError, PersistedAnswer};
use crate::narration::Narrator;
use crate::transcript::TranscriptSource;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub answered: usize,
    pub average_rating: f64,
}

/// Drives one candidate's rehearsal session to completion, one question at
/// a time: transcript capture, evaluation, confirmation, persistence.
///
/// Side effects (capture start/stop, narration) fire only on state
/// transitions. Every failure is recoverable: capture and submission
/// problems keep the candidate answering, evaluation problems become a
/// fallback result, and persistence problems keep the confirmation screen.
pub struct SessionController<E, L> {
    session_id: Uuid,
    questions: Vec<Question>,
    state: SessionState,
    completed: HashSet<Uuid>,
    draft: Option<AnswerDraft>,
    last_result: Option<EvaluationResult>,
    transcript: TranscriptSource,
    evaluator: E,
    ledger: L,
    narrator: Narrator,
    narration_enabled: bool,
}

impl<E, L> SessionController<E, L>
where
    E: CompletionService,
    L: AnswerLedger,
{
    pub fn new(
        session_id: Uuid,
        questions: Vec<Question>,
        transcript: TranscriptSource,
        evaluator: E,
        ledger: L,
        narrator: Narrator,
    ) -> Self {
        Self {
            session_id,
            questions,
            state: SessionState::Idle,
            completed: HashSet::new(),
            draft: None,
            last_result: None,
            transcript,
            evaluator,
            ledger,
            narrator,
            narration_enabled: true,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.state
            .question_index()
            .and_then(|i| self.questions.get(i))
    }

    pub fn completed(&self) -> &HashSet<Uuid> {
        &self.completed
    }

    pub fn draft(&self) -> Option<&AnswerDraft> {
        self.draft.as_ref()
    }

    pub fn last_result(&self) -> Option<&EvaluationResult> {
        self.last_result.as_ref()
    }

    pub fn transcript(&self) -> &TranscriptSource {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut TranscriptSource {
        &mut self.transcript
    }

    fn advance(&mut self, event: SessionEvent) {
        if let Some(next) = self.state.advance(event, self.questions.len()) {
            self.state = next;
        }
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            operation,
            state: self.state.name(),
        }
    }

    /// Start the session: `Idle -> AwaitingAnswer(0)`. Capture auto-starts
    /// and the first question is read aloud when narration is enabled. A
    /// capture error is reported but leaves the session answering - the
    /// candidate can switch to typed input and continue.
    pub async fn begin(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("starting the session"));
        }
        self.advance(SessionEvent::Start);
        if self.state == SessionState::Completed {
            info!("session {} started with no questions", self.session_id);
            return Ok(());
        }
        info!(
            "session {} started with {} questions",
            self.session_id,
            self.questions.len()
        );
        self.open_question(0).await
    }

    /// Submit the captured answer for evaluation. Guarded by the minimum
    /// answer length; a second submission while evaluation is in flight is
    /// rejected, never queued. Evaluation failure never blocks reaching
    /// confirmation - only the quality of the shown result differs.
    pub async fn submit(&mut self) -> Result<EvaluationResult, SessionError> {
        let index = match self.state {
            SessionState::AwaitingAnswer(i) => i,
            _ => return Err(self.invalid("submitting an answer")),
        };

        let text = self.transcript.snapshot().combined().trim().to_string();
        let got = text.chars().count();
        if got < MIN_ANSWER_CHARS {
            return Err(SessionError::SubmissionRejected {
                got,
                min: MIN_ANSWER_CHARS,
            });
        }

        // Release the microphone while the evaluation call is outstanding.
        self.transcript.stop().await;

        let question = self.questions[index].clone();
        self.draft = Some(AnswerDraft {
            question_id: question.id,
            captured_text: text.clone(),
            input_mode: self.transcript.mode(),
        });
        self.advance(SessionEvent::Submit);

        let prompt = build_prompt(&question.text, &question.reference_answer, &text);
        let result = match self.evaluator.evaluate(&prompt).await {
            Ok(raw) => repair_evaluation(&raw),
            Err(e) => {
                warn!("evaluation call failed for question {}: {}", question.id, e);
                EvaluationResult::service_failure(&e)
            }
        };

        self.advance(SessionEvent::Evaluated);
        self.last_result = Some(result.clone());
        Ok(result)
    }

    /// Persist the confirmed answer and advance. The pre-write duplicate
    /// check runs before any network write; duplicates and persistence
    /// failures surface as notices and keep the confirmation screen so the
    /// candidate can retry or re-record.
    pub async fn confirm_save(&mut self) -> Result<(), SessionError> {
        let index = match self.state {
            SessionState::AwaitingConfirmation(i) => i,
            _ => return Err(self.invalid("saving the answer")),
        };
        let (Some(draft), Some(result)) = (self.draft.clone(), self.last_result.clone()) else {
            return Err(self.invalid("saving the answer"));
        };

        self.advance(SessionEvent::ConfirmSave);
        let question = self.questions[index].clone();

        match self.ledger.exists(self.session_id, question.id).await {
            Ok(true) => {
                warn!(
                    "question {} already has a saved answer in session {}",
                    question.id, self.session_id
                );
                self.advance(SessionEvent::SaveFailed);
                return Err(SessionError::DuplicateAnswer);
            }
            Ok(false) => {}
            Err(e) => {
                self.advance(SessionEvent::SaveFailed);
                return Err(e.into());
            }
        }

        let record = PersistedAnswer {
            session_id: self.session_id,
            question_id: question.id,
            question_text: question.text.clone(),
            reference_answer: question.reference_answer.clone(),
            candidate_answer: draft.captured_text,
            feedback: result.feedback,
            rating: result.rating,
            created_at: Utc::now(),
        };

        if let Err(e) = self.ledger.save(&record).await {
            self.advance(SessionEvent::SaveFailed);
            return Err(match e {
                LedgerError::Duplicate => SessionError::DuplicateAnswer,
                other => other.into(),
            });
        }

        // A question is complete only once its write has succeeded.
        self.completed.insert(question.id);
        self.draft = None;
        self.last_result = None;
        self.advance(SessionEvent::Saved);

        match self.state {
            SessionState::AwaitingAnswer(next) => {
                if let Err(e) = self.open_question(next).await {
                    // Recovered locally: the candidate can switch input mode.
                    warn!("capture failed to start for the next question: {}", e);
                }
            }
            SessionState::Completed => {
                self.narrator.cancel().await;
                self.transcript.stop().await;
                info!("session {} completed", self.session_id);
            }
            _ => {}
        }
        Ok(())
    }

    /// Discard the evaluated draft and answer the current question again.
    /// Always permitted from confirmation.
    pub async fn re_record(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::AwaitingConfirmation(_)) {
            return Err(self.invalid("re-recording"));
        }
        self.advance(SessionEvent::ReRecord);
        self.draft = None;
        self.last_result = None;
        self.transcript.reset();
        self.transcript.start().await?;
        Ok(())
    }

    /// Replace the capture variant mid-question. Switching forfeits partial
    /// work: the draft is cleared and in-flight capture stopped, so speech
    /// and typed fragments never mix.
    pub async fn switch_input(&mut self, new_source: TranscriptSource) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::AwaitingAnswer(_)) {
            return Err(self.invalid("switching input mode"));
        }
        self.transcript.stop().await;
        self.transcript = new_source;
        self.transcript.reset();
        self.draft = None;
        self.transcript.start().await?;
        Ok(())
    }

    /// Toggle question narration. Turning it off cancels any playback.
    pub async fn set_narration(&mut self, enabled: bool) {
        self.narration_enabled = enabled;
        if !enabled {
            self.narrator.cancel().await;
        }
    }

    /// History-backed wrap-up, available once the session is completed.
    pub async fn summary(&self) -> Result<SessionSummary, SessionError> {
        if self.state != SessionState::Completed {
            return Err(self.invalid("summarizing the session"));
        }
        let answers = self.ledger.list(self.session_id).await?;
        let answered = answers.len();
        let average_rating = if answered == 0 {
            0.0
        } else {
            answers.iter().map(|a| a.rating as f64).sum::<f64>() / answered as f64
        };
        Ok(SessionSummary {
            answered,
            average_rating,
        })
    }

    async fn open_question(&mut self, index: usize) -> Result<(), SessionError> {
        self.transcript.reset();
        if self.narration_enabled {
            // Starting a new playback always cancels the previous one.
            let text = self.questions[index].text.clone();
            self.narrator.speak(&text).await;
        }
        self.transcript.start().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{Result as ServiceResult, ServiceError};
    use crate::ledger::MemoryLedger;
    use crate::transcript::{ChannelMicrophone, SpeechTranscript, TypedTranscript};

    struct FixedReply(&'static str);

    impl CompletionService for FixedReply {
        async fn evaluate(&self, _prompt: &str) -> ServiceResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingService;

    impl CompletionService for FailingService {
        async fn evaluate(&self, _prompt: &str) -> ServiceResult<String> {
            Err(ServiceError::TransportError("connection refused".to_string()))
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question::new("What is ownership?", "Each value has a single owner."),
            Question::new("What is borrowing?", "Temporary access without ownership."),
        ]
    }

    fn typed_controller<E: CompletionService>(
        questions: Vec<Question>,
        evaluator: E,
        ledger: MemoryLedger,
    ) -> SessionController<E, MemoryLedger> {
        SessionController::new(
            Uuid::new_v4(),
            questions,
            TranscriptSource::Typed(TypedTranscript::new()),
            evaluator,
            ledger,
            Narrator::disabled(),
        )
    }

    fn type_answer<E: CompletionService, L: AnswerLedger>(
        controller: &mut SessionController<E, L>,
        text: &str,
    ) {
        match controller.transcript_mut() {
            TranscriptSource::Typed(t) => t.set_text(text),
            _ => panic!("expected typed transcript"),
        }
    }

    const LONG_ANSWER: &str = "Every value in Rust is owned by exactly one binding at a time.";

    #[tokio::test]
    async fn happy_path_runs_both_questions_to_completion() {
        let ledger = MemoryLedger::new();
        let mut controller = typed_controller(
            questions(),
            FixedReply(r#"{"rating": 7, "feedback": "Good coverage of the basics."}"#),
            ledger.clone(),
        );

        controller.begin().await.unwrap();
        assert_eq!(controller.state(), SessionState::AwaitingAnswer(0));

        type_answer(&mut controller, LONG_ANSWER);
        let result = controller.submit().await.unwrap();
        assert_eq!(result.rating, 7);
        assert_eq!(controller.state(), SessionState::AwaitingConfirmation(0));

        controller.confirm_save().await.unwrap();
        assert_eq!(controller.state(), SessionState::AwaitingAnswer(1));

        type_answer(&mut controller, LONG_ANSWER);
        controller.submit().await.unwrap();
        controller.confirm_save().await.unwrap();
        assert_eq!(controller.state(), SessionState::Completed);

        assert_eq!(ledger.len(), 2);
        let summary = controller.summary().await.unwrap();
        assert_eq!(summary.answered, 2);
        assert!((summary.average_rating - 7.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn completed_set_matches_persisted_answers() {
        let ledger = MemoryLedger::new();
        let question_set = questions();
        let mut controller = typed_controller(
            question_set.clone(),
            FixedReply(r#"{"rating": 6, "feedback": "ok"}"#),
            ledger.clone(),
        );
        controller.begin().await.unwrap();
        for _ in &question_set {
            type_answer(&mut controller, LONG_ANSWER);
            controller.submit().await.unwrap();
            controller.confirm_save().await.unwrap();
        }

        let saved = ledger.list(controller.session_id()).await.unwrap();
        let saved_ids: HashSet<Uuid> = saved.iter().map(|a| a.question_id).collect();
        assert_eq!(&saved_ids, controller.completed());
    }

    #[tokio::test]
    async fn answers_below_the_length_floor_are_rejected() {
        let mut controller = typed_controller(
            questions(),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            MemoryLedger::new(),
        );
        controller.begin().await.unwrap();

        type_answer(&mut controller, &"a".repeat(29));
        match controller.submit().await {
            Err(SessionError::SubmissionRejected { got: 29, min: 30 }) => {}
            other => panic!("expected rejection, got {:?}", other.map(|r| r.rating)),
        }
        assert_eq!(controller.state(), SessionState::AwaitingAnswer(0));

        type_answer(&mut controller, &"a".repeat(30));
        assert!(controller.submit().await.is_ok());
    }

    #[tokio::test]
    async fn submit_outside_awaiting_answer_is_rejected() {
        let mut controller = typed_controller(
            questions(),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            MemoryLedger::new(),
        );
        controller.begin().await.unwrap();
        type_answer(&mut controller, LONG_ANSWER);
        controller.submit().await.unwrap();

        // Already evaluated and awaiting confirmation; a repeat submission
        // is ignored rather than queued.
        assert!(matches!(
            controller.submit().await,
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn service_failure_still_reaches_confirmation_with_zero_rating() {
        let mut controller =
            typed_controller(questions(), FailingService, MemoryLedger::new());
        controller.begin().await.unwrap();
        type_answer(&mut controller, LONG_ANSWER);

        let result = controller.submit().await.unwrap();
        assert_eq!(result.rating, 0);
        assert!(!result.feedback.is_empty());
        assert_eq!(controller.state(), SessionState::AwaitingConfirmation(0));
    }

    #[tokio::test]
    async fn unparsable_reply_falls_back_to_midpoint_rating() {
        let mut controller = typed_controller(
            questions(),
            FixedReply("I cannot evaluate this answer."),
            MemoryLedger::new(),
        );
        controller.begin().await.unwrap();
        type_answer(&mut controller, LONG_ANSWER);

        let result = controller.submit().await.unwrap();
        assert_eq!(result.rating, 5);
        assert_eq!(controller.state(), SessionState::AwaitingConfirmation(0));
    }

    #[tokio::test]
    async fn duplicate_save_is_detected_before_writing() {
        let ledger = MemoryLedger::new();
        let shared_questions = questions();
        let session_id = Uuid::new_v4();

        let mut first = SessionController::new(
            session_id,
            shared_questions.clone(),
            TranscriptSource::Typed(TypedTranscript::new()),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            ledger.clone(),
            Narrator::disabled(),
        );
        first.begin().await.unwrap();
        type_answer(&mut first, LONG_ANSWER);
        first.submit().await.unwrap();
        first.confirm_save().await.unwrap();
        assert_eq!(ledger.len(), 1);

        // A second attempt for the same (session, question) pair.
        let mut second = SessionController::new(
            session_id,
            shared_questions,
            TranscriptSource::Typed(TypedTranscript::new()),
            FixedReply(r#"{"rating": 9, "feedback": "better"}"#),
            ledger.clone(),
            Narrator::disabled(),
        );
        second.begin().await.unwrap();
        type_answer(&mut second, LONG_ANSWER);
        second.submit().await.unwrap();
        assert!(matches!(
            second.confirm_save().await,
            Err(SessionError::DuplicateAnswer)
        ));
        assert_eq!(ledger.len(), 1);
        // The candidate may retry or re-record from here.
        assert_eq!(second.state(), SessionState::AwaitingConfirmation(0));
    }

    #[tokio::test]
    async fn re_record_clears_draft_and_result() {
        let mut controller = typed_controller(
            questions(),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            MemoryLedger::new(),
        );
        controller.begin().await.unwrap();
        type_answer(&mut controller, LONG_ANSWER);
        controller.submit().await.unwrap();
        assert!(controller.last_result().is_some());

        controller.re_record().await.unwrap();
        assert_eq!(controller.state(), SessionState::AwaitingAnswer(0));
        assert!(controller.draft().is_none());
        assert!(controller.last_result().is_none());
        assert_eq!(controller.transcript().snapshot().combined(), "");
    }

    #[tokio::test]
    async fn switching_input_mode_forfeits_captured_text() {
        // Start in speech mode. The recognition stream cannot open in this
        // environment, which is fine: the session stays answering.
        let mut controller = SessionController::new(
            Uuid::new_v4(),
            questions(),
            TranscriptSource::Speech(SpeechTranscript::new(
                String::new(),
                "nova-3".to_string(),
                Box::new(ChannelMicrophone::new(tokio::sync::mpsc::channel(1).1)),
            )),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            MemoryLedger::new(),
            Narrator::disabled(),
        );
        assert!(controller.begin().await.is_err());
        assert_eq!(controller.state(), SessionState::AwaitingAnswer(0));

        if let TranscriptSource::Speech(speech) = controller.transcript() {
            speech.ingest("I would shard the database by tenant", true);
        }
        assert!(!controller.transcript().snapshot().combined().is_empty());

        controller
            .switch_input(TranscriptSource::Typed(TypedTranscript::new()))
            .await
            .unwrap();
        assert_eq!(controller.transcript().snapshot().combined(), "");
        assert!(controller.draft().is_none());
    }

    #[tokio::test]
    async fn begin_twice_is_rejected() {
        let mut controller = typed_controller(
            questions(),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            MemoryLedger::new(),
        );
        controller.begin().await.unwrap();
        assert!(matches!(
            controller.begin().await,
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn empty_question_set_completes_immediately() {
        let mut controller = typed_controller(
            Vec::new(),
            FixedReply(r#"{"rating": 7, "feedback": "ok"}"#),
            MemoryLedger::new(),
        );
        controller.begin().await.unwrap();
        assert_eq!(controller.state(), SessionState::Completed);
        let summary = controller.summary().await.unwrap();
        assert_eq!(summary.answered, 0);
    }
}
