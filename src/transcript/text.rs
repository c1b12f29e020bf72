use tokio::sync::watch;

use super::TranscriptSnapshot;

/// Manual text entry behind the transcript interface.
///
/// The confirmed text is whatever the candidate has typed; there is no
/// interim text and start/stop are no-ops at the `TranscriptSource` level.
pub struct TypedTranscript {
    text: String,
    watch_tx: watch::Sender<TranscriptSnapshot>,
}

impl TypedTranscript {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(TranscriptSnapshot::default());
        Self {
            text: String::new(),
            watch_tx,
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        let _ = self.watch_tx.send(self.snapshot());
    }

    pub fn reset(&mut self) {
        self.text.clear();
        let _ = self.watch_tx.send(TranscriptSnapshot::default());
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            interim: String::new(),
            final_text: self.text.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.watch_tx.subscribe()
    }
}

impl Default for TypedTranscript {
    fn default() -> Self {
        Self::new()
    }
}
