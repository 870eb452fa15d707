//! Core trait definitions for response persistence.
//!
//! Implemented by the `phonotest-store` crate.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Category, TrialResponse, TrialSetKey};

// ---------------------------------------------------------------------------
// Response store trait
// ---------------------------------------------------------------------------

/// Durable storage for trial responses.
///
/// Records are only ever added or, under the overwrite policy, replaced by
/// a record with the same [`ResponseKey`](crate::model::ResponseKey). The
/// core never edits a stored record in place.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Human-readable store name (e.g. "jsonl").
    fn name(&self) -> &str;

    /// Append `records` in order. Returns the number written.
    ///
    /// If the write fails partway, the error is [`StoreError::Partial`] and
    /// carries how many records were committed.
    async fn put_multi(&self, records: &[TrialResponse]) -> Result<usize, StoreError>;

    /// Append `records` only if nothing is stored yet for `subject_id` and
    /// `key`. Returns `None` when a submission already exists.
    ///
    /// The check and the write happen under one lock, so two concurrent
    /// calls for the same subject and phase cannot both succeed.
    async fn put_multi_if_absent(
        &self,
        subject_id: &str,
        key: TrialSetKey,
        records: &[TrialResponse],
    ) -> Result<Option<usize>, StoreError>;

    /// Write `records`, replacing any stored record with the same key.
    async fn upsert_multi(&self, records: &[TrialResponse]) -> Result<usize, StoreError>;

    /// Whether any record exists for this subject and trial set.
    async fn has_submission(&self, subject_id: &str, key: TrialSetKey)
        -> Result<bool, StoreError>;

    /// All stored records of one category, in storage order.
    async fn load_category(&self, category: Category) -> Result<Vec<TrialResponse>, StoreError>;
}
