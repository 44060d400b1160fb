pub mod cache;
pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;

/// One graded worksheet attempt, as written to the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Submission {
    /// The key exactly as the student typed it.
    #[serde(rename = "alumno_id")]
    pub student_key: String,
    #[serde(rename = "hoja_id")]
    pub worksheet_id: String,
    #[serde(rename = "nota")]
    pub score_percent: f64,
    /// JSON document with the per-question detail.
    #[serde(rename = "respuestas_alumno")]
    pub answer_detail: String,
}

/// A submission read back from the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredSubmission {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub submission: Submission,
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Appends one record. Succeeds only once the store confirms the write.
    async fn insert(&self, submission: &Submission) -> Result<(), StorageError>;

    /// Most recent records first, at most `limit` of them.
    async fn select_recent(&self, limit: usize) -> Result<Vec<StoredSubmission>, StorageError>;
}
