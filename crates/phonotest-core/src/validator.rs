//! Decoding and validation of submitted response batches.
//!
//! A batch is three parallel JSON arrays. It is accepted only as a whole:
//! any decoding error or length disagreement rejects every record.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::model::{TrialResponse, TrialSet, TrialSetKey};

/// A submission exactly as it arrives from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSubmission {
    pub subject_id: String,
    pub key: TrialSetKey,
    /// JSON array of chosen response indices.
    pub responses: String,
    /// JSON array of reaction times.
    pub reaction_times: String,
    /// JSON array of client timestamps.
    pub timestamps: String,
}

/// A submission with its arrays decoded but not yet checked against a trial set.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedBatch {
    pub subject_id: String,
    pub key: TrialSetKey,
    pub responses: Vec<i64>,
    pub reaction_times: Vec<f64>,
    pub timestamps: Vec<f64>,
}

impl SubmittedBatch {
    /// Decode the three JSON arrays of a raw submission.
    pub fn decode(raw: &RawSubmission) -> Result<Self, ValidationError> {
        Ok(Self {
            subject_id: raw.subject_id.clone(),
            key: raw.key,
            responses: decode_array("responses", &raw.responses)?,
            reaction_times: decode_array("reaction_times", &raw.reaction_times)?,
            timestamps: decode_array("timestamps", &raw.timestamps)?,
        })
    }
}

/// Decode one JSON array field.
pub fn decode_array<T: DeserializeOwned>(
    field: &'static str,
    text: &str,
) -> Result<Vec<T>, ValidationError> {
    serde_json::from_str(text).map_err(|e| ValidationError::MalformedField {
        field,
        message: e.to_string(),
    })
}

/// Check a batch against its trial set and build one response per trial.
///
/// Every record of the batch shares `submission_id`. Records come back in
/// trial-index order.
pub fn validate_batch(
    set: &TrialSet,
    batch: &SubmittedBatch,
    submission_id: Uuid,
) -> Result<Vec<TrialResponse>, ValidationError> {
    debug_assert_eq!(set.key, batch.key, "batch validated against the wrong set");

    if batch.subject_id.trim().is_empty() {
        return Err(ValidationError::EmptySubject);
    }

    let trials = set.len();
    let (responses, reaction_times, timestamps) = (
        batch.responses.len(),
        batch.reaction_times.len(),
        batch.timestamps.len(),
    );
    if responses != trials || reaction_times != trials || timestamps != trials {
        return Err(ValidationError::LengthMismatch {
            trials,
            responses,
            reaction_times,
            timestamps,
        });
    }

    let received_at = Utc::now();
    let records = set
        .trials
        .iter()
        .enumerate()
        .map(|(i, trial)| {
            let chosen = batch.responses[i];
            TrialResponse {
                submission_id,
                subject_id: batch.subject_id.clone(),
                category: set.key.category,
                position: set.key.position,
                trial_index: i,
                trial_token: trial.token.clone(),
                trial_beginning_phoneme: trial.beginning_phoneme.clone(),
                trial_speaker_id: trial.speaker_id.clone(),
                sentence: trial.sentence_context(),
                user_response_index: chosen,
                is_correct: usize::try_from(chosen)
                    .is_ok_and(|c| c == trial.correct_response_index),
                reaction_time: batch.reaction_times[i],
                timestamp: batch.timestamps[i],
                received_at,
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Congruence, Position, Trial};

    fn choices() -> Vec<String> {
        vec!["bat".into(), "pat".into(), "mat".into()]
    }

    fn word_set(correct: &[usize]) -> TrialSet {
        let trials = correct
            .iter()
            .enumerate()
            .map(|(i, &c)| Trial::word(format!("tok{i}"), "b", "s1", c, choices()).unwrap())
            .collect();
        TrialSet::new(
            TrialSetKey::new(Category::Word, Position::Pre),
            "Word pretest",
            trials,
        )
        .unwrap()
    }

    fn batch(responses: Vec<i64>, rts: Vec<f64>, ts: Vec<f64>) -> SubmittedBatch {
        SubmittedBatch {
            subject_id: "subject-1".into(),
            key: TrialSetKey::new(Category::Word, Position::Pre),
            responses,
            reaction_times: rts,
            timestamps: ts,
        }
    }

    #[test]
    fn scores_each_trial_by_exact_index() {
        let set = word_set(&[1, 0, 2]);
        let b = batch(vec![1, 0, 1], vec![500.0, 620.5, 710.0], vec![1.0, 2.0, 3.0]);
        let records = validate_batch(&set, &b, Uuid::nil()).unwrap();

        assert_eq!(records.len(), 3);
        let correct: Vec<bool> = records.iter().map(|r| r.is_correct).collect();
        assert_eq!(correct, vec![true, true, false]);
        for (i, r) in records.iter().enumerate() {
            assert_eq!(r.trial_index, i);
            assert_eq!(r.trial_token, format!("tok{i}"));
            assert_eq!(r.position, Position::Pre);
            assert!(r.sentence.is_none());
        }
        assert_eq!(records[1].reaction_time, 620.5);
        assert_eq!(records[2].timestamp, 3.0);
    }

    #[test]
    fn short_array_rejects_whole_batch() {
        let set = word_set(&[1, 0, 2]);
        let full = || vec![1.0, 2.0, 3.0];

        let cases = [
            batch(vec![1, 0], full(), full()),
            batch(vec![1, 0, 1], vec![1.0, 2.0], full()),
            batch(vec![1, 0, 1], full(), vec![1.0]),
            batch(vec![1, 0, 1, 2], vec![1.0; 4], vec![1.0; 4]),
        ];
        for b in &cases {
            let err = validate_batch(&set, b, Uuid::nil()).unwrap_err();
            assert!(matches!(err, ValidationError::LengthMismatch { trials: 3, .. }));
        }
    }

    #[test]
    fn negative_or_out_of_range_response_is_incorrect() {
        let set = word_set(&[0, 2]);
        let b = batch(vec![-1, 7], vec![1.0, 1.0], vec![1.0, 1.0]);
        let records = validate_batch(&set, &b, Uuid::nil()).unwrap();
        assert!(records.iter().all(|r| !r.is_correct));
        assert_eq!(records[0].user_response_index, -1);
    }

    #[test]
    fn empty_subject_rejected() {
        let set = word_set(&[0]);
        let mut b = batch(vec![0], vec![1.0], vec![1.0]);
        b.subject_id = "  ".into();
        assert!(matches!(
            validate_batch(&set, &b, Uuid::nil()).unwrap_err(),
            ValidationError::EmptySubject
        ));
    }

    #[test]
    fn sentence_records_carry_sentence_fields() {
        let trial = Trial::sentence(
            "bat",
            "b",
            "s2",
            0,
            choices(),
            "sent-03",
            Congruence::Incongruent,
        )
        .unwrap();
        let key = TrialSetKey::new(Category::Sentence, Position::Post);
        let set = TrialSet::new(key, "Sentence posttest", vec![trial]).unwrap();
        let b = SubmittedBatch {
            key,
            ..batch(vec![0], vec![900.0], vec![5.0])
        };

        let records = validate_batch(&set, &b, Uuid::nil()).unwrap();
        let ctx = records[0].sentence.as_ref().unwrap();
        assert_eq!(ctx.sentence_id, "sent-03");
        assert_eq!(ctx.congruence, Congruence::Incongruent);
        assert_eq!(records[0].category, Category::Sentence);
    }

    #[test]
    fn decode_reports_malformed_field() {
        let raw = RawSubmission {
            subject_id: "subject-1".into(),
            key: TrialSetKey::new(Category::Word, Position::Pre),
            responses: "[1, 0, 2]".into(),
            reaction_times: "[512.0, 488".into(),
            timestamps: "[1, 2, 3]".into(),
        };
        let err = SubmittedBatch::decode(&raw).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MalformedField { field: "reaction_times", .. }
        ));

        let ok = RawSubmission {
            reaction_times: "[512.0, 488, 730.25]".into(),
            ..raw
        };
        let decoded = SubmittedBatch::decode(&ok).unwrap();
        assert_eq!(decoded.responses, vec![1, 0, 2]);
        assert_eq!(decoded.reaction_times[1], 488.0);
    }

    #[test]
    fn fractional_response_index_is_malformed() {
        let err = decode_array::<i64>("responses", "[1.5]").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedField { field: "responses", .. }));
    }
}
