use log::{info, warn};
use tokio::process::{Child, Command};

/// Cancellable read-aloud handle for question narration.
///
/// Playback runs as an external synthesis command with the text as its final
/// argument. Starting a new playback always kills the previous one first, so
/// audio from two questions never overlaps; dropping the narrator kills any
/// in-flight child. Narration feeds nothing back into the pipeline.
pub struct Narrator {
    command: Option<String>,
    current: Option<Child>,
}

impl Narrator {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command,
            current: None,
        }
    }

    /// Narrator that never produces audio, for hosts without a synthesis
    /// command.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub async fn speak(&mut self, text: &str) {
        self.cancel().await;

        let Some(command_line) = &self.command else {
            return;
        };
        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return;
        };

        let mut command = Command::new(program);
        command.args(parts).arg(text).kill_on_drop(true);

        match command.spawn() {
            Ok(child) => {
                info!("narration started ({} chars)", text.len());
                self.current = Some(child);
            }
            Err(e) => {
                // Playback failure never blocks the session.
                warn!("narration command failed to start: {}", e);
            }
        }
    }

    pub async fn cancel(&mut self) {
        if let Some(mut child) = self.current.take() {
            let _ = child.kill().await;
        }
    }

    pub fn is_speaking(&mut self) -> bool {
        match self.current.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_narrator_never_speaks() {
        let mut narrator = Narrator::disabled();
        narrator.speak("Tell me about yourself.").await;
        assert!(!narrator.is_speaking());
    }

    #[tokio::test]
    async fn cancel_with_nothing_playing_is_a_no_op() {
        let mut narrator = Narrator::disabled();
        narrator.cancel().await;
        assert!(!narrator.is_speaking());
    }
}
