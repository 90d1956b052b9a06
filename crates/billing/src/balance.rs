use std::sync::atomic::{AtomicI64, Ordering};

/// Last server-confirmed credit balance for the session's user.
///
/// The metering loop reads it synchronously for its go/no-go check before
/// each charge. It is written only by the session-start seed and the ledger
/// client's success path, so it never holds a locally predicted value —
/// staleness is bounded by one ledger round trip.
#[derive(Debug, Default)]
pub struct BalanceCache {
    credits: AtomicI64,
}

impl BalanceCache {
    pub fn new(initial: i64) -> Self {
        Self {
            credits: AtomicI64::new(initial),
        }
    }

    pub fn get(&self) -> i64 {
        self.credits.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, value: i64) {
        self.credits.store(value, Ordering::Release);
    }
}
