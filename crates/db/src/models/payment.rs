use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A manual mobile-money top-up awaiting admin review. Approval credits the
/// user through the ledger and links the resulting purchase transaction
/// back to this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub user_name: String,
    pub user_email: String,
    pub phone_number: String,
    /// Mobile-money transaction id as typed by the user. Globally unique.
    pub transaction_ref: String,
    /// Paid amount in currency units.
    pub amount: i64,
    /// Credits to grant when approved.
    pub credits: i64,
    #[serde(default)]
    pub status: PaymentStatus,
    pub created_at: DateTime,
    pub reviewed_at: Option<DateTime>,
    pub reviewed_by: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl Payment {
    pub const COLLECTION: &'static str = "payments";
}
