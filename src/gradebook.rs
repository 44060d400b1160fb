use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StorageError;
use crate::storage::cache::RecentSubmissions;
use crate::storage::{StoredSubmission, Submission, SubmissionStore};
use crate::worksheet::grader::{grade, GradingResult};
use crate::worksheet::Worksheet;

pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// What came out of handing in one worksheet.
///
/// `result` is valid even when `stored` failed.
#[derive(Debug)]
pub struct Receipt {
    pub result: GradingResult,
    pub stored: Result<(), StorageError>,
}

/// Grades worksheets, records them and serves the teacher's listing.
pub struct Gradebook {
    store: Arc<dyn SubmissionStore>,
    recent: RecentSubmissions,
    recent_limit: usize,
}

impl Gradebook {
    pub fn new(store: Arc<dyn SubmissionStore>, recent: RecentSubmissions, recent_limit: usize) -> Self {
        Self {
            store,
            recent,
            recent_limit,
        }
    }

    pub async fn submit(
        &self,
        student_key: &str,
        worksheet: &Worksheet,
        answers: &HashMap<String, String>,
    ) -> Receipt {
        let result = grade(answers, worksheet);
        let submission = Submission {
            student_key: student_key.to_string(),
            worksheet_id: worksheet.id.clone(),
            score_percent: result.rounded_score(),
            answer_detail: result.details_json().to_string(),
        };

        let stored = self.store.insert(&submission).await;
        match &stored {
            Ok(()) => {
                log::info!(
                    "Stored {}% for student {} on {}",
                    submission.score_percent,
                    submission.student_key,
                    submission.worksheet_id
                );
                self.recent.invalidate();
            }
            Err(e) => log::warn!(
                "Could not store {} for student {}: {}",
                submission.worksheet_id,
                submission.student_key,
                e
            ),
        }

        Receipt { result, stored }
    }

    /// Recent submissions for the teacher, newest first.
    pub async fn recent(&self) -> Result<Vec<StoredSubmission>, StorageError> {
        self.recent
            .get_or_fetch(self.store.as_ref(), self.recent_limit)
            .await
    }
}
