//! The experiment service.
//!
//! Ties the trial-set registry, the response validator, a response store,
//! and the download secret together, and tracks where each subject is in
//! each phase.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::SharedSecret;
use crate::error::{AuthorizationError, ExperimentError, ValidationError};
use crate::model::TrialSetKey;
use crate::registry::TrialSetRegistry;
use crate::report::{generate_csv, CsvDownload, ReportKind, REPORT_CONTENT_TYPE, REPORT_FILENAME};
use crate::statistics::{aggregate, ResultSummary};
use crate::traits::ResponseStore;
use crate::validator::{validate_batch, RawSubmission, SubmittedBatch};

/// What to do when a subject submits a phase they already submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Refuse the second batch.
    RejectDuplicate,
    /// Store the second batch alongside the first.
    #[default]
    AllowDuplicate,
    /// Replace earlier records with the same subject, phase, and trial index.
    OverwriteByKey,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::RejectDuplicate => write!(f, "reject-duplicate"),
            DuplicatePolicy::AllowDuplicate => write!(f, "allow-duplicate"),
            DuplicatePolicy::OverwriteByKey => write!(f, "overwrite-by-key"),
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject-duplicate" | "reject" => Ok(DuplicatePolicy::RejectDuplicate),
            "allow-duplicate" | "allow" => Ok(DuplicatePolicy::AllowDuplicate),
            "overwrite-by-key" | "overwrite" => Ok(DuplicatePolicy::OverwriteByKey),
            other => Err(format!("unknown duplicate policy: {other}")),
        }
    }
}

/// Where a subject is in one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    NotStarted,
    InProgress,
    /// At least one batch was persisted.
    Submitted,
    /// The last attempt failed validation; nothing was stored.
    Rejected,
}

/// Configuration for the experiment service.
#[derive(Debug, Clone, Default)]
pub struct ExperimentConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Download secret. With none configured every download is refused.
    pub download_secret: Option<SharedSecret>,
}

/// One trial as shown to a subject. The correct answer is not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedTrial {
    /// 1-based page number.
    pub page: usize,
    pub token: String,
    pub response_choices: Vec<String>,
    pub sound_file_name: String,
}

/// Everything a client needs to run one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePresentation {
    pub key: TrialSetKey,
    pub subject_id: String,
    pub trials: Vec<PresentedTrial>,
    /// Page number of the closing page, one past the last trial.
    pub final_index: usize,
    /// Where the client posts its results.
    pub end_url: String,
}

/// Acknowledgement of a stored batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub saved_count: usize,
}

/// Percent-encode `value` for use in a URL query string.
///
/// Everything outside the RFC 3986 unreserved set is escaped as UTF-8 bytes.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// The experiment service.
///
/// Submission state is tracked per instance and is not persisted. A
/// process that builds a fresh `Experiment` for each request (as the CLI
/// does) sees every subject start in [`SubmissionState::NotStarted`]; only
/// the store's contents carry over between instances, and the duplicate
/// policy is enforced against the store, not against this state.
pub struct Experiment {
    registry: Arc<TrialSetRegistry>,
    store: Arc<dyn ResponseStore>,
    config: ExperimentConfig,
    sessions: Mutex<HashMap<(String, TrialSetKey), SubmissionState>>,
}

impl Experiment {
    pub fn new(
        registry: Arc<TrialSetRegistry>,
        store: Arc<dyn ResponseStore>,
        config: ExperimentConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &TrialSetRegistry {
        &self.registry
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.config.duplicate_policy
    }

    /// Current state of `subject_id` in phase `key`.
    pub fn state(&self, subject_id: &str, key: TrialSetKey) -> SubmissionState {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(subject_id.to_string(), key))
            .copied()
            .unwrap_or_default()
    }

    /// Move `subject_id`/`key` to `next`. A submitted phase stays submitted.
    fn transition(&self, subject_id: &str, key: TrialSetKey, next: SubmissionState) {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = sessions.entry((subject_id.to_string(), key)).or_default();
        if *state != SubmissionState::Submitted || next == SubmissionState::Submitted {
            tracing::debug!(subject_id, %key, from = ?*state, to = ?next, "phase state change");
            *state = next;
        }
    }

    /// Start a phase: return its trials for rendering.
    pub fn start_phase(
        &self,
        subject_id: &str,
        key: TrialSetKey,
    ) -> Result<PhasePresentation, ExperimentError> {
        if subject_id.trim().is_empty() {
            return Err(ValidationError::EmptySubject.into());
        }

        let set = self.registry.get(key);
        let trials: Vec<PresentedTrial> = set
            .trials
            .iter()
            .enumerate()
            .map(|(i, trial)| PresentedTrial {
                page: i + 1,
                token: trial.token.clone(),
                response_choices: trial.response_choices.clone(),
                sound_file_name: trial.sound_file_name(),
            })
            .collect();

        self.transition(subject_id, key, SubmissionState::InProgress);

        Ok(PhasePresentation {
            key,
            subject_id: subject_id.to_string(),
            final_index: trials.len() + 1,
            end_url: format!("{}?suid={}", key.end_route(), encode_query_value(subject_id)),
            trials,
        })
    }

    /// Validate and persist a submitted batch.
    ///
    /// Nothing is written unless the whole batch validates. A second batch
    /// for the same subject and phase is handled per [`DuplicatePolicy`].
    pub async fn submit(&self, raw: &RawSubmission) -> Result<SubmissionReceipt, ExperimentError> {
        let key = raw.key;
        let subject_id = raw.subject_id.as_str();
        let submission_id = Uuid::new_v4();

        let records = match SubmittedBatch::decode(raw)
            .and_then(|batch| validate_batch(self.registry.get(key), &batch, submission_id))
        {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(subject_id, %key, "rejected submission: {e}");
                self.transition(subject_id, key, SubmissionState::Rejected);
                return Err(e.into());
            }
        };

        let write = match self.config.duplicate_policy {
            DuplicatePolicy::RejectDuplicate => {
                self.store
                    .put_multi_if_absent(subject_id, key, &records)
                    .await
            }
            DuplicatePolicy::AllowDuplicate => self.store.put_multi(&records).await.map(Some),
            DuplicatePolicy::OverwriteByKey => self.store.upsert_multi(&records).await.map(Some),
        };
        let saved_count = match write {
            Ok(Some(n)) => n,
            Ok(None) => {
                tracing::warn!(subject_id, %key, "rejected duplicate submission");
                return Err(ValidationError::DuplicateSubmission {
                    subject_id: subject_id.to_string(),
                    key,
                }
                .into());
            }
            Err(e) => {
                tracing::error!(
                    subject_id,
                    %key,
                    %submission_id,
                    committed = e.committed(),
                    total = records.len(),
                    store = self.store.name(),
                    "failed to persist submission: {e}"
                );
                self.transition(subject_id, key, SubmissionState::InProgress);
                return Err(e.into());
            }
        };

        self.transition(subject_id, key, SubmissionState::Submitted);
        tracing::info!(subject_id, %key, %submission_id, saved_count, "stored submission");

        Ok(SubmissionReceipt {
            submission_id,
            saved_count,
        })
    }

    /// Aggregate stored responses for one report, without rendering.
    pub async fn summarize(&self, kind: ReportKind) -> Result<ResultSummary, ExperimentError> {
        let responses = self.store.load_category(kind.category).await?;
        Ok(aggregate(&responses, kind.category, kind.organizer))
    }

    /// Check the shared secret and produce the selected CSV report.
    ///
    /// The secret is checked before the selector, so a wrong password is
    /// rejected the same way whatever was requested.
    pub async fn download_report(
        &self,
        password: &str,
        selector: &str,
    ) -> Result<CsvDownload, ExperimentError> {
        let authorized = self
            .config
            .download_secret
            .as_ref()
            .ok_or(AuthorizationError)
            .and_then(|secret| secret.verify(password));
        if let Err(e) = authorized {
            tracing::warn!("rejected report download");
            return Err(e.into());
        }

        let kind = ReportKind::from_selector(selector)?;
        let responses = self.store.load_category(kind.category).await?;
        tracing::info!(
            category = %kind.category,
            organizer = %kind.organizer,
            records = responses.len(),
            "generating report"
        );

        Ok(CsvDownload {
            filename: REPORT_FILENAME,
            content_type: REPORT_CONTENT_TYPE,
            body: generate_csv(&responses, kind),
        })
    }
}
