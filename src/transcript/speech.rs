use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::buffer::TranscriptBuffer;
use super::{CaptureError, Result, TranscriptSnapshot};

const DEEPGRAM_LISTEN_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Access to the host's capture device. `open` is called once per start
/// attempt, so permission prompts are requested per attempt, never cached.
pub trait Microphone: Send {
    fn open(&mut self) -> Result<mpsc::Receiver<Vec<u8>>>;
}

/// A microphone backed by a channel of PCM frames supplied by the host's
/// audio capture. Single-use: a second `open` reports the device as gone.
pub struct ChannelMicrophone {
    rx: Option<mpsc::Receiver<Vec<u8>>>,
}

impl ChannelMicrophone {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx: Some(rx) }
    }
}

impl Microphone for ChannelMicrophone {
    fn open(&mut self) -> Result<mpsc::Receiver<Vec<u8>>> {
        self.rx.take().ok_or(CaptureError::NoSignal)
    }
}

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(default)]
    channel: Option<RecognitionChannel>,
    #[serde(default)]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
struct RecognitionChannel {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognitionAlternative {
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

struct Shared {
    buffer: Mutex<TranscriptBuffer>,
    watch_tx: watch::Sender<TranscriptSnapshot>,
}

impl Shared {
    fn ingest(&self, transcript: &str, is_final: bool) {
        let mut buffer = self.buffer.lock();
        if is_final {
            buffer.push_final(transcript);
        } else {
            buffer.set_interim(transcript);
        }
        let _ = self.watch_tx.send(buffer.snapshot());
    }
}

/// Live speech-to-text over a Deepgram streaming WebSocket.
///
/// `start` requests the microphone and opens the recognition stream; a reader
/// task folds interim/final results into the shared buffer while a sender
/// task forwards PCM frames. `stop` ends capture without discarding confirmed
/// text and releases the microphone on every exit path.
pub struct SpeechTranscript {
    api_key: String,
    model: String,
    microphone: Box<dyn Microphone>,
    shared: Arc<Shared>,
    stop_flag: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl SpeechTranscript {
    pub fn new(api_key: String, model: String, microphone: Box<dyn Microphone>) -> Self {
        let (watch_tx, _) = watch::channel(TranscriptSnapshot::default());
        Self {
            api_key,
            model,
            microphone,
            shared: Arc::new(Shared {
                buffer: Mutex::new(TranscriptBuffer::new()),
                watch_tx,
            }),
            stop_flag: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.connected.load(Ordering::Relaxed) {
            warn!("speech capture already running, ignoring start");
            return Ok(());
        }
        if self.api_key.is_empty() {
            return Err(CaptureError::Unsupported(
                "DEEPGRAM_API_KEY is not set".to_string(),
            ));
        }

        // Acquire the device before touching the network; a denied prompt
        // must leave the source stopped without a half-open stream.
        let mut audio_rx = self.microphone.open()?;

        let mut ws_url = url::Url::parse(DEEPGRAM_LISTEN_URL)
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        ws_url
            .query_pairs_mut()
            .append_pair("model", &self.model)
            .append_pair("language", "en-US")
            .append_pair("encoding", "linear16")
            .append_pair("sample_rate", "44100")
            .append_pair("channels", "1")
            .append_pair("endpointing", "50")
            .append_pair("interim_results", "true")
            .append_pair("smart_format", "true")
            .append_pair("punctuate", "true");

        let request = tungstenite::http::Request::builder()
            .method("GET")
            .uri(ws_url.as_str())
            .header("Host", "api.deepgram.com")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Authorization", format!("Token {}", self.api_key))
            .body(())
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| CaptureError::Stream(format!("recognition connect failed: {}", e)))?;

        info!("speech recognition stream connected (model: {})", self.model);

        // Fresh flag per capture so tasks from an earlier run keep their own.
        self.stop_flag = Arc::new(AtomicBool::new(false));
        self.connected.store(true, Ordering::Relaxed);

        let (mut write, mut read) = ws_stream.split();

        let shared = self.shared.clone();
        let stop_flag = self.stop_flag.clone();
        let connected = self.connected.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Ok(response) = serde_json::from_str::<RecognitionResponse>(&text) {
                            if let Some(alternative) = response
                                .channel
                                .and_then(|c| c.alternatives.into_iter().next())
                            {
                                let transcript = alternative.transcript.trim().to_string();
                                if !transcript.is_empty() {
                                    if response.is_final {
                                        info!(
                                            "final segment: \"{}\" ({:.1}%)",
                                            transcript,
                                            alternative.confidence * 100.0
                                        );
                                    }
                                    shared.ingest(&transcript, response.is_final);
                                }
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("recognition stream closed by server");
                        break;
                    }
                    Err(e) => {
                        error!("recognition stream error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            connected.store(false, Ordering::Relaxed);
        });

        let stop_flag = self.stop_flag.clone();
        tokio::spawn(async move {
            loop {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                match tokio::time::timeout(Duration::from_millis(100), audio_rx.recv()).await {
                    Ok(Some(frame)) => {
                        if let Err(e) = write.send(Message::Binary(frame)).await {
                            error!("failed to send audio frame: {}", e);
                            break;
                        }
                    }
                    // Microphone channel closed: the device is gone.
                    Ok(None) => break,
                    Err(_) => continue,
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        Ok(())
    }

    pub async fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        // Give the reader and sender tasks a moment to wind down and send
        // the close frame.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    pub fn reset(&mut self) {
        self.shared.buffer.lock().clear();
        let _ = self.shared.watch_tx.send(TranscriptSnapshot::default());
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.shared.buffer.lock().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.shared.watch_tx.subscribe()
    }

    pub fn is_capturing(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn ingest(&self, transcript: &str, is_final: bool) {
        self.shared.ingest(transcript, is_final);
    }
}

impl Drop for SpeechTranscript {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeniedMicrophone;

    impl Microphone for DeniedMicrophone {
        fn open(&mut self) -> Result<mpsc::Receiver<Vec<u8>>> {
            Err(CaptureError::PermissionDenied)
        }
    }

    #[tokio::test]
    async fn denied_microphone_leaves_source_stopped() {
        let mut source = SpeechTranscript::new(
            "test-key".to_string(),
            "nova-3".to_string(),
            Box::new(DeniedMicrophone),
        );
        match source.start().await {
            Err(CaptureError::PermissionDenied) => {}
            other => panic!("expected PermissionDenied, got {:?}", other.err()),
        }
        assert!(!source.is_capturing());
    }

    #[tokio::test]
    async fn missing_api_key_is_unsupported() {
        let (_tx, rx) = mpsc::channel(1);
        let mut source = SpeechTranscript::new(
            String::new(),
            "nova-3".to_string(),
            Box::new(ChannelMicrophone::new(rx)),
        );
        assert!(matches!(
            source.start().await,
            Err(CaptureError::Unsupported(_))
        ));
        assert!(!source.is_capturing());
    }

    #[test]
    fn channel_microphone_is_single_use() {
        let (_tx, rx) = mpsc::channel(1);
        let mut microphone = ChannelMicrophone::new(rx);
        assert!(microphone.open().is_ok());
        assert!(matches!(microphone.open(), Err(CaptureError::NoSignal)));
    }

    #[test]
    fn ingest_accumulates_finals_and_replaces_interim() {
        let (_tx, rx) = mpsc::channel(1);
        let source = SpeechTranscript::new(
            "test-key".to_string(),
            "nova-3".to_string(),
            Box::new(ChannelMicrophone::new(rx)),
        );
        source.ingest("Tell me about", false);
        source.ingest("Tell me about a project", true);
        source.ingest("you led", true);
        let snapshot = source.snapshot();
        assert_eq!(snapshot.final_text, "Tell me about a project you led");
        assert_eq!(snapshot.interim, "");
    }
}
