use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub language: String,
    pub duration_secs: Option<f64>,
    pub confidence: Option<f64>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Live,
    File,
}

impl HistoryEntry {
    pub const COLLECTION: &'static str = "transcription_history";
}
