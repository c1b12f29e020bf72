pub mod buffer;
pub mod speech;
pub mod text;

pub use buffer::TranscriptBuffer;
pub use speech::{ChannelMicrophone, Microphone, SpeechTranscript};
pub use text::TypedTranscript;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("speech capture unavailable: {0}")]
    Unsupported(String),
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no audio signal from the capture device")]
    NoSignal,
    #[error("speech stream failed: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// The current state of an answer being captured: confirmed text plus the
/// in-flight interim hypothesis (speech only - typed input has no interim).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptSnapshot {
    pub interim: String,
    pub final_text: String,
}

impl TranscriptSnapshot {
    /// Everything captured so far, confirmed text first.
    pub fn combined(&self) -> String {
        if self.interim.is_empty() {
            self.final_text.clone()
        } else if self.final_text.is_empty() {
            self.interim.clone()
        } else {
            format!("{} {}", self.final_text, self.interim)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    Speech,
    Text,
}

/// One interface over the two capture variants. The session controller only
/// talks to this enum; which variant backs a given answer is the candidate's
/// choice.
pub enum TranscriptSource {
    Speech(SpeechTranscript),
    Typed(TypedTranscript),
}

impl TranscriptSource {
    pub fn mode(&self) -> InputMode {
        match self {
            TranscriptSource::Speech(_) => InputMode::Speech,
            TranscriptSource::Typed(_) => InputMode::Text,
        }
    }

    /// Begin capture. A no-op for typed input; for speech this requests the
    /// microphone and opens the recognition stream. Errors leave the source
    /// stopped.
    pub async fn start(&mut self) -> Result<()> {
        match self {
            TranscriptSource::Speech(s) => s.start().await,
            TranscriptSource::Typed(_) => Ok(()),
        }
    }

    /// End capture without discarding confirmed text. The microphone is
    /// released unconditionally.
    pub async fn stop(&mut self) {
        match self {
            TranscriptSource::Speech(s) => s.stop().await,
            TranscriptSource::Typed(_) => {}
        }
    }

    /// Clear both confirmed and interim text.
    pub fn reset(&mut self) {
        match self {
            TranscriptSource::Speech(s) => s.reset(),
            TranscriptSource::Typed(t) => t.reset(),
        }
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        match self {
            TranscriptSource::Speech(s) => s.snapshot(),
            TranscriptSource::Typed(t) => t.snapshot(),
        }
    }

    /// Continuous notification of capture progress.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        match self {
            TranscriptSource::Speech(s) => s.subscribe(),
            TranscriptSource::Typed(t) => t.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_joins_final_and_interim() {
        let snapshot = TranscriptSnapshot {
            interim: "wor".to_string(),
            final_text: "Hello".to_string(),
        };
        assert_eq!(snapshot.combined(), "Hello wor");
    }

    #[test]
    fn combined_with_one_side_empty() {
        let snapshot = TranscriptSnapshot {
            interim: String::new(),
            final_text: "Hello".to_string(),
        };
        assert_eq!(snapshot.combined(), "Hello");

        let snapshot = TranscriptSnapshot {
            interim: "Hel".to_string(),
            final_text: String::new(),
        };
        assert_eq!(snapshot.combined(), "Hel");
    }
}
