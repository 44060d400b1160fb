use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::StorageError;
use crate::storage::{StoredSubmission, SubmissionStore};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct Entry {
    fetched_at: Instant,
    limit: usize,
    rows: Vec<StoredSubmission>,
}

#[derive(Default)]
struct Slot {
    /// Bumped by every `invalidate`.
    generation: u64,
    entry: Option<Entry>,
}

/// Short-lived copy of the recent-submissions listing.
///
/// Entries expire after `ttl` and are dropped early by `invalidate`, which is
/// called after every confirmed write. Failed reads are never cached, and
/// neither is a read that was still in flight when `invalidate` ran.
pub struct RecentSubmissions {
    ttl: Duration,
    slot: Mutex<Slot>,
}

impl RecentSubmissions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(Slot::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached rows, or the generation a fresh read starts from.
    fn cached(&self, limit: usize) -> Result<Vec<StoredSubmission>, u64> {
        let slot = self.lock();
        slot.entry
            .as_ref()
            .filter(|e| e.limit == limit && e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.rows.clone())
            .ok_or(slot.generation)
    }

    pub async fn get_or_fetch(
        &self,
        store: &dyn SubmissionStore,
        limit: usize,
    ) -> Result<Vec<StoredSubmission>, StorageError> {
        let generation = match self.cached(limit) {
            Ok(rows) => {
                log::debug!("Serving {} recent submissions from cache", rows.len());
                return Ok(rows);
            }
            Err(generation) => generation,
        };

        let rows = store.select_recent(limit).await?;
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.entry = Some(Entry {
                fetched_at: Instant::now(),
                limit,
                rows: rows.clone(),
            });
        } else {
            log::debug!("Recent submissions changed during the read; not caching it");
        }
        Ok(rows)
    }

    pub fn invalidate(&self) {
        let mut slot = self.lock();
        slot.generation = slot.generation.wrapping_add(1);
        slot.entry = None;
    }
}

impl Default for RecentSubmissions {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
