//! Error types for the experiment core.
//!
//! Configuration errors are fatal and raised while the trial-set registry is
//! built. Validation and authorization errors are recoverable and always
//! collapse into one generic message at the boundary, so a caller cannot
//! tell which check failed. Store errors are surfaced as-is.

use thiserror::Error;

use crate::model::TrialSetKey;

/// Message shown for every rejected submission or download.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, your request could not be processed. Please try again or contact the experimenter.";

/// Invalid static configuration (trial sets, registry).
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A trial has no response choices.
    #[error("trial '{token}' has no response choices")]
    EmptyChoices { token: String },

    /// A trial's correct index points outside its choices.
    #[error("trial '{token}': correct response index {index} out of range for {choices} choice(s)")]
    CorrectIndexOutOfRange {
        token: String,
        index: usize,
        choices: usize,
    },

    /// A trial of the wrong category was placed in a trial set.
    #[error("trial '{token}' does not belong in the {key} trial set")]
    CategoryMismatch { token: String, key: TrialSetKey },

    /// The registry was built without one of the four trial sets.
    #[error("missing trial set: {0}")]
    MissingTrialSet(TrialSetKey),

    /// Two trial sets were supplied for the same key.
    #[error("duplicate trial set: {0}")]
    DuplicateTrialSet(TrialSetKey),
}

/// A submitted batch or download request that failed a structural check.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The subject ID was empty.
    #[error("subject ID is empty")]
    EmptySubject,

    /// One of the parallel arrays could not be decoded.
    #[error("malformed {field}: {message}")]
    MalformedField {
        field: &'static str,
        message: String,
    },

    /// The parallel arrays disagree in length with each other or with the trial set.
    #[error(
        "length mismatch: {trials} trials, {responses} responses, \
         {reaction_times} reaction times, {timestamps} timestamps"
    )]
    LengthMismatch {
        trials: usize,
        responses: usize,
        reaction_times: usize,
        timestamps: usize,
    },

    /// The report file-type selector was not one of `1..=4`.
    #[error("unknown report file type: {0}")]
    UnknownFileType(String),

    /// The subject already submitted this phase and duplicates are rejected.
    #[error("subject '{subject_id}' already submitted {key}")]
    DuplicateSubmission { subject_id: String, key: TrialSetKey },
}

/// The shared secret did not match.
#[derive(Debug, Error)]
#[error("shared secret mismatch")]
pub struct AuthorizationError;

/// Failures from a response store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed before anything was written.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or a stored line could not be decoded.
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bulk write failed after some records were committed.
    #[error("partial write: {committed} of {total} records committed: {message}")]
    Partial {
        committed: usize,
        total: usize,
        message: String,
    },

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Number of records known to be committed when the error occurred.
    pub fn committed(&self) -> usize {
        match self {
            StoreError::Partial { committed, .. } => *committed,
            _ => 0,
        }
    }
}

/// Any failure from an [`Experiment`](crate::experiment::Experiment) entry point.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl ExperimentError {
    /// Returns `true` if the caller may simply try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExperimentError::Validation(_) | ExperimentError::Authorization(_)
        )
    }

    /// The text that may be shown to a subject or downloader.
    ///
    /// Validation and authorization failures share one message so the
    /// response never reveals whether, say, the password was the problem.
    pub fn public_message(&self) -> &'static str {
        match self {
            ExperimentError::Validation(_) | ExperimentError::Authorization(_) => {
                GENERIC_FAILURE_MESSAGE
            }
            ExperimentError::Configuration(_) => "The experiment is misconfigured.",
            ExperimentError::Persistence(_) => {
                "Your responses could not be saved. Please contact the experimenter."
            }
        }
    }
}
