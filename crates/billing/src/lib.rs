pub mod balance;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod ledger;
pub mod meter;
pub mod provider;

pub use balance::BalanceCache;
pub use config::SpeechConfig;
pub use controller::{SessionController, SessionPhase};
pub use coordinator::{
    ActiveSession, SessionCoordinator, SessionEndReason, SessionEvent, SessionStopper,
};
pub use ledger::{AdjustmentKind, Ledger, LedgerClient, LedgerError};
pub use meter::{CREDIT_QUANTUM, CreditMeter, MeterHandle, MeterSignal};
pub use provider::{ProviderEvent, ProviderRegistry, ProviderSession, SpeechProvider};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A transcript fragment forwarded from the streaming provider, unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub confidence: Option<f64>,
}

/// Failures raised while bringing a session up. All of them refuse the
/// session before the first credit is touched.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("insufficient credits")]
    InsufficientCredits,
    #[error("speech provider not configured: {0}")]
    Configuration(String),
    #[error("speech provider connection failed: {0}")]
    Connect(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
