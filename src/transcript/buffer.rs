use super::TranscriptSnapshot;

/// Accumulates recognition results into confirmed and in-flight text.
///
/// Confirmed (final) segments are appended and joined by a single space.
/// Only the latest interim result is kept; a final result replaces it.
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    finals: Vec<String>,
    interim: String,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_final(&mut self, segment: &str) {
        let segment = segment.trim();
        if !segment.is_empty() {
            self.finals.push(segment.to_string());
        }
        // A final result supersedes whatever interim text preceded it.
        self.interim.clear();
    }

    pub fn set_interim(&mut self, text: &str) {
        self.interim = text.trim().to_string();
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            interim: self.interim.clone(),
            final_text: self.finals.join(" "),
        }
    }

    pub fn clear(&mut self) {
        self.finals.clear();
        self.interim.clear();
    }
}
