//! In-memory response store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use phonotest_core::error::StoreError;
use phonotest_core::model::{Category, TrialResponse, TrialSetKey};
use phonotest_core::traits::ResponseStore;

/// A response store that keeps everything in a `Vec`.
///
/// Contents are lost when the process exits. Useful for tests and dry runs;
/// can be told to fail partway through a bulk write.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<TrialResponse>>,
    /// Fail a bulk write once this many records of it are committed.
    fail_after: Option<usize>,
    /// Number of bulk writes attempted.
    write_calls: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose bulk writes fail after committing `n` records.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// Snapshot of all stored records in storage order.
    pub fn records(&self) -> Vec<TrialResponse> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of bulk write calls made.
    pub fn write_calls(&self) -> u32 {
        self.write_calls.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrialResponse>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_injected_failure(&self, written: usize, total: usize) -> Result<(), StoreError> {
        match self.fail_after {
            Some(n) if written == n => Err(StoreError::Partial {
                committed: written,
                total,
                message: "injected failure".into(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_multi(&self, records: &[TrialResponse]) -> Result<usize, StoreError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        let mut stored = self.lock();
        for (i, record) in records.iter().enumerate() {
            self.check_injected_failure(i, records.len())?;
            stored.push(record.clone());
        }
        Ok(records.len())
    }

    async fn put_multi_if_absent(
        &self,
        subject_id: &str,
        key: TrialSetKey,
        records: &[TrialResponse],
    ) -> Result<Option<usize>, StoreError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        let mut stored = self.lock();
        if stored
            .iter()
            .any(|r| r.subject_id == subject_id && r.trial_set_key() == key)
        {
            return Ok(None);
        }
        for (i, record) in records.iter().enumerate() {
            self.check_injected_failure(i, records.len())?;
            stored.push(record.clone());
        }
        Ok(Some(records.len()))
    }

    async fn upsert_multi(&self, records: &[TrialResponse]) -> Result<usize, StoreError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        let mut stored = self.lock();
        for (i, record) in records.iter().enumerate() {
            self.check_injected_failure(i, records.len())?;
            let key = record.key();
            stored.retain(|existing| existing.key() != key);
            stored.push(record.clone());
        }
        Ok(records.len())
    }

    async fn has_submission(
        &self,
        subject_id: &str,
        key: TrialSetKey,
    ) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .iter()
            .any(|r| r.subject_id == subject_id && r.trial_set_key() == key))
    }

    async fn load_category(&self, category: Category) -> Result<Vec<TrialResponse>, StoreError> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use phonotest_core::model::Position;
    use uuid::Uuid;

    pub(crate) fn record(
        subject: &str,
        key: TrialSetKey,
        index: usize,
        correct: bool,
    ) -> TrialResponse {
        TrialResponse {
            submission_id: Uuid::new_v4(),
            subject_id: subject.into(),
            category: key.category,
            position: key.position,
            trial_index: index,
            trial_token: format!("tok-{index}"),
            trial_beginning_phoneme: "b".into(),
            trial_speaker_id: "s1".into(),
            sentence: None,
            user_response_index: 0,
            is_correct: correct,
            reaction_time: 500.0,
            timestamp: 1_700_000_000_000.0,
            received_at: Utc::now(),
        }
    }

    fn word_pre() -> TrialSetKey {
        TrialSetKey::new(Category::Word, Position::Pre)
    }

    #[tokio::test]
    async fn put_and_load() {
        let store = MemoryStore::new();
        let batch = vec![record("a", word_pre(), 0, true), record("a", word_pre(), 1, false)];
        assert_eq!(store.put_multi(&batch).await.unwrap(), 2);
        assert_eq!(store.put_multi(&batch).await.unwrap(), 2);
        assert_eq!(store.len(), 4);
        assert_eq!(store.write_calls(), 2);

        assert_eq!(store.load_category(Category::Word).await.unwrap().len(), 4);
        assert!(store.load_category(Category::Sentence).await.unwrap().is_empty());
        assert!(store.has_submission("a", word_pre()).await.unwrap());
        assert!(!store.has_submission("b", word_pre()).await.unwrap());
    }

    #[tokio::test]
    async fn upsert_replaces_same_key() {
        let store = MemoryStore::new();
        store
            .put_multi(&[record("a", word_pre(), 0, false), record("b", word_pre(), 0, false)])
            .await
            .unwrap();
        store.upsert_multi(&[record("a", word_pre(), 0, true)]).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.subject_id == "a" && r.is_correct));
        assert!(records.iter().any(|r| r.subject_id == "b" && !r.is_correct));
    }

    #[tokio::test]
    async fn put_if_absent_skips_existing_submission() {
        let store = MemoryStore::new();
        let first = vec![record("a", word_pre(), 0, true), record("a", word_pre(), 1, true)];
        assert_eq!(
            store.put_multi_if_absent("a", word_pre(), &first).await.unwrap(),
            Some(2)
        );

        let retry = vec![record("a", word_pre(), 0, false)];
        assert_eq!(store.put_multi_if_absent("a", word_pre(), &retry).await.unwrap(), None);
        assert_eq!(store.len(), 2);

        let post = TrialSetKey::new(Category::Word, Position::Post);
        let other = vec![record("a", post, 0, false)];
        assert_eq!(store.put_multi_if_absent("a", post, &other).await.unwrap(), Some(1));
        assert_eq!(store.len(), 3);
        assert_eq!(store.write_calls(), 3);
    }

    #[tokio::test]
    async fn injected_failure_reports_committed_count() {
        let store = MemoryStore::failing_after(1);
        let batch: Vec<_> = (0..3).map(|i| record("a", word_pre(), i, true)).collect();
        let err = store.put_multi(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Partial { committed: 1, total: 3, .. }));
        assert_eq!(store.len(), 1);
    }
}
