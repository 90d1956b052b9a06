use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use scribeflow_db::models::{Plan, User, UserRole};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    /// Creates an account with zero credits. The welcome grant goes through
    /// the ledger afterwards so the transaction audit starts complete.
    pub async fn create(
        &self,
        email: String,
        name: String,
        password_hash: String,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email,
            name,
            password_hash: Some(password_hash),
            credits: 0,
            plan: Plan::Free,
            role: UserRole::User,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "email": email })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn touch_login(&self, user_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! { "$set": { "last_login_at": DateTime::now() } },
            )
            .await
    }

    pub async fn set_role(&self, user_id: ObjectId, role: UserRole) -> DaoResult<bool> {
        self.base
            .update_by_id(
                user_id,
                doc! { "$set": { "role": bson::to_bson(&role)? } },
            )
            .await
    }

    pub async fn list(&self, params: &PaginationParams) -> DaoResult<PaginatedResult<User>> {
        self.base
            .find_paginated(doc! {}, Some(doc! { "created_at": -1 }), params)
            .await
    }
}
