/// Where the session stands for the question at the carried index.
///
/// The index only ever moves forward, and only through `Saving`; the
/// controller triggers side effects (capture start/stop, narration) on
/// transitions, never on ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingAnswer(usize),
    Evaluating(usize),
    AwaitingConfirmation(usize),
    Saving(usize),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Submit,
    Evaluated,
    ConfirmSave,
    Saved,
    SaveFailed,
    ReRecord,
}

impl SessionState {
    /// Pure transition function. `None` means the event is illegal in the
    /// current state and must be ignored by the caller.
    pub fn advance(self, event: SessionEvent, total_questions: usize) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Idle, Start) => {
                if total_questions == 0 {
                    Some(Completed)
                } else {
                    Some(AwaitingAnswer(0))
                }
            }
            (AwaitingAnswer(i), Submit) => Some(Evaluating(i)),
            (Evaluating(i), Evaluated) => Some(AwaitingConfirmation(i)),
            (AwaitingConfirmation(i), ConfirmSave) => Some(Saving(i)),
            (Saving(i), Saved) => {
                if i + 1 == total_questions {
                    Some(Completed)
                } else {
                    Some(AwaitingAnswer(i + 1))
                }
            }
            (Saving(i), SaveFailed) => Some(AwaitingConfirmation(i)),
            (AwaitingConfirmation(i), ReRecord) => Some(AwaitingAnswer(i)),
            _ => None,
        }
    }

    pub fn question_index(&self) -> Option<usize> {
        match self {
            SessionState::AwaitingAnswer(i)
            | SessionState::Evaluating(i)
            | SessionState::AwaitingConfirmation(i)
            | SessionState::Saving(i) => Some(*i),
            SessionState::Idle | SessionState::Completed => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingAnswer(_) => "awaiting an answer",
            SessionState::Evaluating(_) => "evaluating",
            SessionState::AwaitingConfirmation(_) => "awaiting confirmation",
            SessionState::Saving(_) => "saving",
            SessionState::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed)
    }
}
