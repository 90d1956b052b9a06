use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::balance::BalanceCache;
use crate::ledger::{AdjustmentKind, LedgerClient, LedgerError};

/// One credit buys this much session time. Fixed so elapsed-time-to-credits
/// conversion stays exact integer arithmetic.
pub const CREDIT_QUANTUM: Duration = Duration::from_secs(2);

/// Fires landing closer than this to the previous charge are discarded
/// instead of charging twice (timer drift / double-fire guard).
pub const MIN_CHARGE_SPACING: Duration = Duration::from_millis(1900);

const USAGE_DESCRIPTION: &str = "Live transcription usage";

#[derive(Debug)]
pub enum MeterSignal {
    /// A quantum was debited; carries the server-confirmed balance.
    Charged(i64),
    /// The last paid quantum emptied the balance (or the loop was started
    /// with an empty balance). No further quantum will be armed.
    InsufficientCredits,
    /// An adjustment failed. Metering halts without charging again; this is
    /// never folded into `InsufficientCredits`.
    BillingError(LedgerError),
}

/// Cancels the metering loop.
///
/// Stopping discards any pending timer immediately. An in-flight charge is
/// allowed to complete and its result still applies, but no further quantum
/// is armed and no signal is emitted after the stop.
pub struct MeterHandle {
    stop_tx: watch::Sender<bool>,
}

impl MeterHandle {
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// The billing heartbeat: while armed, debits one credit per quantum and
/// signals the coordinator the instant the balance cannot sustain another.
///
/// Charges are strictly serialized — the next quantum is only armed after
/// the previous adjustment resolved — and the continue/stop decision always
/// uses the server-confirmed post-charge balance, never a value predicted
/// from the pre-charge cache. Overspend under cache staleness is therefore
/// bounded by a single quantum.
pub struct CreditMeter {
    ledger: LedgerClient,
    cache: Arc<BalanceCache>,
    signal_tx: mpsc::Sender<MeterSignal>,
}

impl CreditMeter {
    pub fn new(
        ledger: LedgerClient,
        cache: Arc<BalanceCache>,
        signal_tx: mpsc::Sender<MeterSignal>,
    ) -> Self {
        Self {
            ledger,
            cache,
            signal_tx,
        }
    }

    /// Arms the loop. When the cached balance cannot cover a single quantum
    /// the insufficient-credits signal fires instead and no timer is armed.
    pub fn start(self) -> MeterHandle {
        let (stop_tx, stop_rx) = watch::channel(false);

        if self.cache.get() <= 0 {
            let signal_tx = self.signal_tx.clone();
            tokio::spawn(async move {
                let _ = signal_tx.send(MeterSignal::InsufficientCredits).await;
            });
            return MeterHandle { stop_tx };
        }

        tokio::spawn(self.run(stop_rx));
        MeterHandle { stop_tx }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        let mut last_charge: Option<Instant> = None;
        let mut deadline = Instant::now() + CREDIT_QUANTUM;
        debug!("credit meter armed");

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => {
                    debug!("credit meter stopped while armed");
                    return;
                }
                _ = time::sleep_until(deadline) => {}
            }

            let now = Instant::now();
            if !charge_due(last_charge, now) {
                // Spurious fire inside the spacing guard: re-arm, don't charge.
                deadline = match last_charge {
                    Some(prev) => prev + CREDIT_QUANTUM,
                    None => now + CREDIT_QUANTUM,
                };
                continue;
            }

            match self
                .ledger
                .adjust(-1, AdjustmentKind::Usage, USAGE_DESCRIPTION)
                .await
            {
                Ok(balance) => {
                    last_charge = Some(now);

                    if *stop_rx.borrow() {
                        // stop() raced the in-flight charge: the debit stands,
                        // but nothing further is armed or signalled.
                        return;
                    }

                    if self
                        .signal_tx
                        .send(MeterSignal::Charged(balance))
                        .await
                        .is_err()
                    {
                        return;
                    }

                    if balance <= 0 {
                        // The user received the quantum they just paid for,
                        // but the next one can no longer be covered.
                        let _ = self.signal_tx.send(MeterSignal::InsufficientCredits).await;
                        return;
                    }

                    deadline = now + CREDIT_QUANTUM;
                }
                Err(e) => {
                    warn!(%e, "quantum charge failed, halting meter");
                    if !*stop_rx.borrow() {
                        let _ = self.signal_tx.send(MeterSignal::BillingError(e)).await;
                    }
                    return;
                }
            }
        }
    }
}

/// Spacing guard: a fire is only chargeable once at least ~95% of a quantum
/// has passed since the previous successful charge.
fn charge_due(last_charge: Option<Instant>, now: Instant) -> bool {
    match last_charge {
        None => true,
        Some(prev) => now.duration_since(prev) >= MIN_CHARGE_SPACING,
    }
}
