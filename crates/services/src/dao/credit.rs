use bson::{DateTime, doc, oid::ObjectId};
use mongodb::{Collection, Database};
use scribeflow_db::models::{CreditTransaction, TransactionType, User};
use tracing::debug;

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

/// The authoritative credit ledger: user balances plus their append-only
/// transaction trail.
pub struct CreditDao {
    users: Collection<User>,
    transactions: BaseDao<CreditTransaction>,
}

impl CreditDao {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection::<User>(User::COLLECTION),
            transactions: BaseDao::new(db, CreditTransaction::COLLECTION),
        }
    }

    pub async fn balance_of(&self, user_id: ObjectId) -> DaoResult<i64> {
        let user = self
            .users
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or(DaoError::NotFound)?;
        Ok(user.credits)
    }

    /// Applies a signed delta to the user's balance, clamped at zero, and
    /// appends the audit record for the delta that actually landed.
    ///
    /// The clamp runs as an aggregation-pipeline update against the stored
    /// value, so concurrent adjustments from other tabs or devices serialize
    /// inside MongoDB: with a balance of 1, two racing decrements yield one
    /// applied debit and one no-op. A no-op writes no transaction record,
    /// which keeps `sum(amounts) == credits` exact.
    pub async fn adjust(
        &self,
        user_id: ObjectId,
        amount: i64,
        kind: TransactionType,
        description: &str,
        payment_id: Option<ObjectId>,
    ) -> DaoResult<i64> {
        let update = vec![doc! {
            "$set": {
                "credits": { "$max": [0, { "$add": ["$credits", amount] }] },
                "updated_at": "$$NOW",
            }
        }];

        // Default find-and-modify semantics return the pre-image; the new
        // balance is derived with the same clamp the pipeline applied.
        let before = self
            .users
            .find_one_and_update(doc! { "_id": user_id }, update)
            .await?
            .ok_or(DaoError::NotFound)?;

        let new_balance = (before.credits + amount).max(0);
        let applied = new_balance - before.credits;

        if applied != 0 {
            let record = CreditTransaction {
                id: None,
                user_id,
                amount: applied,
                kind,
                description: description.to_string(),
                payment_id,
                created_at: DateTime::now(),
            };
            self.transactions.insert_one(&record).await?;
        }

        debug!(%user_id, amount, applied, new_balance, "credit adjustment");
        Ok(new_balance)
    }

    pub async fn transactions_for(
        &self,
        user_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<CreditTransaction>> {
        self.transactions
            .find_paginated(
                doc! { "user_id": user_id },
                Some(doc! { "created_at": -1 }),
                params,
            )
            .await
    }
}
