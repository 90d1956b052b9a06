use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use mongodb::options::ReturnDocument;
use scribeflow_db::models::{Payment, PaymentStatus, User};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct PaymentDao {
    pub base: BaseDao<Payment>,
}

impl PaymentDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Payment::COLLECTION),
        }
    }

    /// Records a submitted top-up as pending. The unique index on
    /// `transaction_ref` rejects resubmitted mobile-money transaction ids.
    pub async fn submit(
        &self,
        user: &User,
        phone_number: String,
        transaction_ref: String,
        amount: i64,
        credits: i64,
    ) -> DaoResult<Payment> {
        let user_id = user.id.ok_or(DaoError::NotFound)?;
        let payment = Payment {
            id: None,
            user_id,
            user_name: user.name.clone(),
            user_email: user.email.clone(),
            phone_number,
            transaction_ref,
            amount,
            credits,
            status: PaymentStatus::Pending,
            created_at: DateTime::now(),
            reviewed_at: None,
            reviewed_by: None,
        };

        let id = self.base.insert_one(&payment).await?;
        self.base.find_by_id(id).await
    }

    pub async fn list_for_user(&self, user_id: ObjectId) -> DaoResult<Vec<Payment>> {
        self.base
            .find_many(
                doc! { "user_id": user_id },
                Some(doc! { "created_at": -1 }),
                None,
            )
            .await
    }

    pub async fn list_all(
        &self,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Payment>> {
        self.base
            .find_paginated(doc! {}, Some(doc! { "created_at": -1 }), params)
            .await
    }

    /// Flips a pending payment to approved/rejected. The status guard rides
    /// in the filter, so a payment is only ever reviewed once even when two
    /// admins race.
    pub async fn review(
        &self,
        payment_id: ObjectId,
        approve: bool,
        reviewer: ObjectId,
    ) -> DaoResult<Payment> {
        let status = if approve {
            PaymentStatus::Approved
        } else {
            PaymentStatus::Rejected
        };

        let updated = self
            .base
            .collection()
            .find_one_and_update(
                doc! {
                    "_id": payment_id,
                    "status": bson::to_bson(&PaymentStatus::Pending)?,
                },
                doc! {
                    "$set": {
                        "status": bson::to_bson(&status)?,
                        "reviewed_at": DateTime::now(),
                        "reviewed_by": reviewer,
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(payment) => Ok(payment),
            None => {
                // Either unknown, or somebody else got there first.
                self.base.find_by_id(payment_id).await?;
                Err(DaoError::Validation(
                    "Payment already processed".to_string(),
                ))
            }
        }
    }
}
