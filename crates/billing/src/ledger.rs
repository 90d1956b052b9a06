use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::balance::BalanceCache;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("not authorized")]
    Unauthorized,
    #[error("adjustment rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Purchase,
    Usage,
    Bonus,
}

/// Authoritative credit store, already scoped to one user.
///
/// `adjust` returns the server-confirmed new balance. Implementations must
/// apply decrements as `max(0, current + delta)` atomically against the
/// stored value — never against the caller's view — so concurrent sessions
/// on other tabs or devices serialize inside the store.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    async fn balance(&self) -> Result<i64, LedgerError>;

    async fn adjust(
        &self,
        delta: i64,
        kind: AdjustmentKind,
        description: &str,
    ) -> Result<i64, LedgerError>;
}

/// Couples a [`Ledger`] with the session's [`BalanceCache`].
///
/// This is the only writer of the cache: every value it stores came back
/// from the ledger. Failed adjustments are not retried here — retry/abort
/// policy belongs to the metering loop, because a lost decrement must not
/// silently compound.
#[derive(Clone)]
pub struct LedgerClient {
    ledger: Arc<dyn Ledger>,
    cache: Arc<BalanceCache>,
}

impl LedgerClient {
    pub fn new(ledger: Arc<dyn Ledger>, cache: Arc<BalanceCache>) -> Self {
        Self { ledger, cache }
    }

    /// Reads the current balance and warms the cache with it.
    pub async fn seed(&self) -> Result<i64, LedgerError> {
        let balance = self.ledger.balance().await?;
        self.cache.set(balance);
        Ok(balance)
    }

    /// Requests a balance delta and reconciles the cache with the
    /// server-confirmed result.
    pub async fn adjust(
        &self,
        delta: i64,
        kind: AdjustmentKind,
        description: &str,
    ) -> Result<i64, LedgerError> {
        let balance = self.ledger.adjust(delta, kind, description).await?;
        self.cache.set(balance);
        debug!(delta, balance, "ledger adjustment applied");
        Ok(balance)
    }
}
