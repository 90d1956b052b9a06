use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use scribeflow_billing::{AdjustmentKind, Ledger, LedgerError};
use scribeflow_db::models::TransactionType;

use crate::dao::base::DaoError;
use crate::dao::credit::CreditDao;

/// The billing core's view of the ledger, scoped to a single user.
pub struct UserLedger {
    credits: Arc<CreditDao>,
    user_id: ObjectId,
}

impl UserLedger {
    pub fn new(credits: Arc<CreditDao>, user_id: ObjectId) -> Self {
        Self { credits, user_id }
    }
}

#[async_trait]
impl Ledger for UserLedger {
    async fn balance(&self) -> Result<i64, LedgerError> {
        self.credits
            .balance_of(self.user_id)
            .await
            .map_err(map_dao_error)
    }

    async fn adjust(
        &self,
        delta: i64,
        kind: AdjustmentKind,
        description: &str,
    ) -> Result<i64, LedgerError> {
        self.credits
            .adjust(self.user_id, delta, kind_to_type(kind), description, None)
            .await
            .map_err(map_dao_error)
    }
}

fn kind_to_type(kind: AdjustmentKind) -> TransactionType {
    match kind {
        AdjustmentKind::Purchase => TransactionType::Purchase,
        AdjustmentKind::Usage => TransactionType::Usage,
        AdjustmentKind::Bonus => TransactionType::Bonus,
    }
}

fn map_dao_error(e: DaoError) -> LedgerError {
    match e {
        DaoError::NotFound => LedgerError::Rejected("user not found".to_string()),
        DaoError::Forbidden(msg) => LedgerError::Rejected(msg),
        DaoError::Validation(msg) => LedgerError::Rejected(msg),
        other => LedgerError::Unavailable(other.to_string()),
    }
}
