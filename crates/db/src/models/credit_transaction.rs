use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One entry of the append-only credit ledger. `amount` is the delta that
/// was actually applied (post-clamp), so summing a user's transactions
/// always reproduces their current balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<ObjectId>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Usage,
    Bonus,
}

impl CreditTransaction {
    pub const COLLECTION: &'static str = "credit_transactions";
}
