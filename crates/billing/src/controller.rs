use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::provider::{ProviderEvent, SpeechProvider};
use crate::{SessionError, TranscriptEvent};

/// Liveness of the provider connection, published on a single watch channel.
/// This is the one fact the coordinator keys off — raw provider events never
/// reach the billing side.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Idle,
    Active,
    Closed,
    Failed(String),
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Active)
    }
}

/// Owns the lifecycle of one streaming provider connection.
///
/// `open` connects and flips the phase to `Active`; transcript fragments are
/// forwarded upward unchanged; the phase drops to `Closed`/`Failed` when the
/// provider goes away. `close` is idempotent and safe from any state.
pub struct SessionController {
    provider: Arc<dyn SpeechProvider>,
    language: String,
    phase_tx: watch::Sender<SessionPhase>,
    audio_tx: Option<mpsc::Sender<Vec<u8>>>,
    pump: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(provider: Arc<dyn SpeechProvider>, language: impl Into<String>) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            provider,
            language: language.into(),
            phase_tx,
            audio_tx: None,
            pump: None,
        }
    }

    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Opens the provider session. Returns the audio-frame sender; transcript
    /// fragments are forwarded to `transcript_tx` until the session ends.
    pub async fn open(
        &mut self,
        transcript_tx: mpsc::Sender<TranscriptEvent>,
    ) -> Result<mpsc::Sender<Vec<u8>>, SessionError> {
        let session = self.provider.open(&self.language).await?;
        debug!(provider = self.provider.name(), language = %self.language, "provider session open");

        self.audio_tx = Some(session.audio_tx.clone());
        let _ = self.phase_tx.send(SessionPhase::Active);

        let phase_tx = self.phase_tx.clone();
        let mut events = session.events;
        self.pump = Some(tokio::spawn(async move {
            let end_phase = loop {
                match events.recv().await {
                    Some(ProviderEvent::Transcript {
                        text,
                        is_final,
                        confidence,
                    }) => {
                        let event = TranscriptEvent {
                            text,
                            is_final,
                            confidence,
                        };
                        if transcript_tx.send(event).await.is_err() {
                            break SessionPhase::Closed;
                        }
                    }
                    Some(ProviderEvent::Closed) | None => break SessionPhase::Closed,
                    Some(ProviderEvent::Error(message)) => {
                        warn!(%message, "provider session error");
                        break SessionPhase::Failed(message);
                    }
                }
            };
            phase_tx.send_if_modified(|phase| {
                if phase.is_active() {
                    *phase = end_phase;
                    true
                } else {
                    false
                }
            });
        }));

        Ok(session.audio_tx)
    }

    /// Tears down audio forwarding and the provider connection. Safe to call
    /// repeatedly and from any state.
    pub fn close(&mut self) {
        // Dropping the sender closes the provider write side.
        self.audio_tx = None;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.phase_tx.send_if_modified(|phase| {
            if phase.is_active() {
                *phase = SessionPhase::Closed;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.close();
    }
}
