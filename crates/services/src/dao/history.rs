use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;
use scribeflow_db::models::{HistoryEntry, HistoryKind};

use super::base::{BaseDao, DaoResult};

pub struct HistoryDao {
    pub base: BaseDao<HistoryEntry>,
}

impl HistoryDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, HistoryEntry::COLLECTION),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add(
        &self,
        user_id: ObjectId,
        text: String,
        kind: HistoryKind,
        file_name: Option<String>,
        language: String,
        duration_secs: Option<f64>,
        confidence: Option<f64>,
    ) -> DaoResult<HistoryEntry> {
        let entry = HistoryEntry {
            id: None,
            user_id,
            text,
            kind,
            file_name,
            language,
            duration_secs,
            confidence,
            created_at: DateTime::now(),
        };

        let id = self.base.insert_one(&entry).await?;
        self.base.find_by_id(id).await
    }

    pub async fn list_for_user(
        &self,
        user_id: ObjectId,
        limit: i64,
    ) -> DaoResult<Vec<HistoryEntry>> {
        self.base
            .find_many(
                doc! { "user_id": user_id },
                Some(doc! { "created_at": -1 }),
                Some(limit),
            )
            .await
    }
}
