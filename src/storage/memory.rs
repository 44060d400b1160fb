use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage::{StoredSubmission, Submission, SubmissionStore};

/// Keeps submissions in process memory; they are gone after a restart.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredSubmission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StorageError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.push(StoredSubmission {
            created_at: Some(Utc::now()),
            submission: submission.clone(),
        });
        Ok(())
    }

    async fn select_recent(&self, limit: usize) -> Result<Vec<StoredSubmission>, StorageError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(worksheet_id: &str) -> Submission {
        Submission {
            student_key: "8".to_string(),
            worksheet_id: worksheet_id.to_string(),
            score_percent: 60.0,
            answer_detail: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_up_to_limit() {
        let store = MemoryStore::new();
        for i in 1..=4 {
            store
                .insert(&submission(&format!("hoja_{}_clave_8", i)))
                .await
                .unwrap();
        }

        let recent = store.select_recent(2).await.unwrap();
        let ids: Vec<_> = recent
            .iter()
            .map(|r| r.submission.worksheet_id.as_str())
            .collect();
        assert_eq!(ids, vec!["hoja_4_clave_8", "hoja_3_clave_8"]);
        assert!(recent.iter().all(|r| r.created_at.is_some()));
        assert_eq!(store.len(), 4);
    }
}
