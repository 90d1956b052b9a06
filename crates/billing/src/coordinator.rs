use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::balance::BalanceCache;
use crate::controller::{SessionController, SessionPhase};
use crate::ledger::{Ledger, LedgerClient};
use crate::meter::{CreditMeter, MeterHandle, MeterSignal};
use crate::provider::SpeechProvider;
use crate::{SessionError, TranscriptEvent};

/// Why a session ended. Emitted exactly once per session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEndReason {
    /// Explicit stop by the caller.
    Stopped,
    /// The balance can no longer cover a quantum. Expected, not a fault.
    InsufficientCredits,
    /// A charge failed. Distinct from exhaustion so the caller can offer
    /// "retry" instead of "buy credits".
    BillingError(String),
    ProviderClosed,
    ProviderError(String),
}

#[derive(Debug)]
pub enum SessionEvent {
    Transcript(TranscriptEvent),
    /// Server-confirmed balance after a quantum charge.
    Balance(i64),
    Ended(SessionEndReason),
}

/// Glue between the metering loop and the session controller: starts them
/// in lockstep, stops billing before capture ever outlives it, and turns
/// meter signals into a caller-visible end-of-session event.
pub struct SessionCoordinator {
    ledger: LedgerClient,
    cache: Arc<BalanceCache>,
    provider: Arc<dyn SpeechProvider>,
    language: String,
}

impl SessionCoordinator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        provider: Arc<dyn SpeechProvider>,
        language: impl Into<String>,
    ) -> Self {
        let cache = Arc::new(BalanceCache::new(0));
        let ledger = LedgerClient::new(ledger, cache.clone());
        Self {
            ledger,
            cache,
            provider,
            language: language.into(),
        }
    }

    /// Seeds the balance cache, opens the provider session and arms the
    /// metering loop.
    ///
    /// Refused before any billing when the balance is empty, the provider
    /// is unconfigured, or the connection cannot be established.
    pub async fn start(self) -> Result<ActiveSession, SessionError> {
        let balance = self.ledger.seed().await?;
        if balance <= 0 {
            return Err(SessionError::InsufficientCredits);
        }

        let mut controller = SessionController::new(self.provider, self.language);
        let (transcript_tx, transcript_rx) = mpsc::channel(64);
        let audio_tx = controller.open(transcript_tx).await?;

        let (signal_tx, signal_rx) = mpsc::channel(8);
        let meter = CreditMeter::new(self.ledger.clone(), self.cache.clone(), signal_tx);
        let meter_handle = meter.start();

        let (event_tx, events) = mpsc::channel(64);
        let (stop_tx, stop_rx) = watch::channel(false);
        let phase_rx = controller.phase();

        info!(balance, "transcription session started");
        tokio::spawn(supervise(
            controller,
            meter_handle,
            signal_rx,
            transcript_rx,
            phase_rx,
            stop_rx,
            event_tx,
        ));

        Ok(ActiveSession {
            audio_tx,
            events,
            stop_tx,
            balance_at_start: balance,
        })
    }
}

/// Handle to a running session. Dropping it stops the session.
pub struct ActiveSession {
    audio_tx: mpsc::Sender<Vec<u8>>,
    events: mpsc::Receiver<SessionEvent>,
    stop_tx: watch::Sender<bool>,
    balance_at_start: i64,
}

impl ActiveSession {
    pub fn balance_at_start(&self) -> i64 {
        self.balance_at_start
    }

    pub fn audio_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.audio_tx.clone()
    }

    /// Requests teardown: billing halts at once, then capture is closed.
    /// Idempotent; the `Ended` event still arrives through `next_event`.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Splits the handle for callers that pump events from a separate task.
    pub fn into_parts(
        self,
    ) -> (
        SessionStopper,
        mpsc::Sender<Vec<u8>>,
        mpsc::Receiver<SessionEvent>,
    ) {
        (
            SessionStopper {
                stop_tx: self.stop_tx,
            },
            self.audio_tx,
            self.events,
        )
    }
}

/// Stop half of a split [`ActiveSession`]. Dropping it stops the session.
pub struct SessionStopper {
    stop_tx: watch::Sender<bool>,
}

impl SessionStopper {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Single owner of the session's moving parts. Terminates on the first
/// terminal condition, which makes the `Ended` event exactly-once by
/// construction.
async fn supervise(
    mut controller: SessionController,
    meter: MeterHandle,
    mut signals: mpsc::Receiver<MeterSignal>,
    mut transcripts: mpsc::Receiver<TranscriptEvent>,
    mut phase: watch::Receiver<SessionPhase>,
    mut stop_rx: watch::Receiver<bool>,
    events: mpsc::Sender<SessionEvent>,
) {
    let mut signals_open = true;
    let mut transcripts_open = true;

    let reason = loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                // Explicit stop (or the handle was dropped). Billing halts
                // before capture teardown, never the other way around.
                meter.stop();
                controller.close();
                break SessionEndReason::Stopped;
            }
            signal = signals.recv(), if signals_open => match signal {
                Some(MeterSignal::Charged(balance)) => {
                    let _ = events.send(SessionEvent::Balance(balance)).await;
                }
                Some(MeterSignal::InsufficientCredits) => {
                    controller.close();
                    break SessionEndReason::InsufficientCredits;
                }
                Some(MeterSignal::BillingError(e)) => {
                    controller.close();
                    break SessionEndReason::BillingError(e.to_string());
                }
                None => signals_open = false,
            },
            transcript = transcripts.recv(), if transcripts_open => match transcript {
                Some(event) => {
                    let _ = events.send(SessionEvent::Transcript(event)).await;
                }
                // Pump finished; the phase watch decides the reason.
                None => transcripts_open = false,
            },
            changed = phase.changed() => {
                if changed.is_err() {
                    meter.stop();
                    break SessionEndReason::ProviderClosed;
                }
                let current = phase.borrow_and_update().clone();
                match current {
                    SessionPhase::Closed => {
                        meter.stop();
                        break SessionEndReason::ProviderClosed;
                    }
                    SessionPhase::Failed(message) => {
                        meter.stop();
                        break SessionEndReason::ProviderError(message);
                    }
                    SessionPhase::Idle | SessionPhase::Active => {}
                }
            }
        }
    };

    debug!(?reason, "session ended");
    let _ = events.send(SessionEvent::Ended(reason)).await;
}
