//! Core data model types for phonotest.
//!
//! Trials and trial sets are static configuration. Trial responses are the
//! only records that get persisted; they copy the identifying metadata of
//! their trial so reports never need to re-join against configuration.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigurationError;

/// Kind of stimulus a trial set presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Word,
    Sentence,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Word => write!(f, "word"),
            Category::Sentence => write!(f, "sentence"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "word" | "w" => Ok(Category::Word),
            "sentence" | "s" => Ok(Category::Sentence),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Which administration of a trial set a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Pre,
    Post,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Pre => write!(f, "pre"),
            Position::Post => write!(f, "post"),
        }
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre" | "pretest" => Ok(Position::Pre),
            "post" | "posttest" => Ok(Position::Post),
            other => Err(format!("unknown position: {other}")),
        }
    }
}

/// Identifies one of the four trial sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialSetKey {
    pub category: Category,
    pub position: Position,
}

impl TrialSetKey {
    /// Every trial set the experiment runs, in presentation order.
    pub const ALL: [TrialSetKey; 4] = [
        TrialSetKey::new(Category::Word, Position::Pre),
        TrialSetKey::new(Category::Sentence, Position::Pre),
        TrialSetKey::new(Category::Word, Position::Post),
        TrialSetKey::new(Category::Sentence, Position::Post),
    ];

    pub const fn new(category: Category, position: Position) -> Self {
        Self { category, position }
    }

    /// Short route name, e.g. `wpre` or `spost`.
    pub fn route_name(&self) -> &'static str {
        match (self.category, self.position) {
            (Category::Word, Position::Pre) => "wpre",
            (Category::Word, Position::Post) => "wpost",
            (Category::Sentence, Position::Pre) => "spre",
            (Category::Sentence, Position::Post) => "spost",
        }
    }

    /// Route a client posts its results to.
    pub fn end_route(&self) -> String {
        format!("/{}/end", self.route_name())
    }
}

impl fmt::Display for TrialSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.category, self.position)
    }
}

impl FromStr for TrialSetKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if let Some(key) = TrialSetKey::ALL
            .iter()
            .find(|k| k.route_name() == lower.trim_start_matches('/'))
        {
            return Ok(*key);
        }
        let (category, position) = lower
            .split_once(|c: char| matches!(c, '-' | '_' | ':'))
            .ok_or_else(|| format!("unknown phase: {s}"))?;
        Ok(TrialSetKey::new(category.parse()?, position.parse()?))
    }
}

/// Whether a sentence's context matches the target phoneme category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Congruence {
    Congruent,
    Incongruent,
}

impl fmt::Display for Congruence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Congruence::Congruent => write!(f, "congruent"),
            Congruence::Incongruent => write!(f, "incongruent"),
        }
    }
}

/// Variant-specific part of a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrialKind {
    Word,
    Sentence {
        sentence_id: String,
        congruence: Congruence,
    },
}

/// One stimulus presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Stable identifier for the stimulus item.
    pub token: String,
    /// The phonetic category under study.
    pub beginning_phoneme: String,
    /// Speaker/voice of the recording.
    pub speaker_id: String,
    /// Index into `response_choices` of the correct answer.
    pub correct_response_index: usize,
    /// Labels shown to the subject; their order is the response index space.
    pub response_choices: Vec<String>,
    #[serde(flatten)]
    pub kind: TrialKind,
}

impl Trial {
    /// Build a word trial, checking the choice invariant.
    pub fn word(
        token: impl Into<String>,
        beginning_phoneme: impl Into<String>,
        speaker_id: impl Into<String>,
        correct_response_index: usize,
        response_choices: Vec<String>,
    ) -> Result<Self, ConfigurationError> {
        let trial = Self {
            token: token.into(),
            beginning_phoneme: beginning_phoneme.into(),
            speaker_id: speaker_id.into(),
            correct_response_index,
            response_choices,
            kind: TrialKind::Word,
        };
        trial.check()?;
        Ok(trial)
    }

    /// Build a sentence trial, checking the choice invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn sentence(
        token: impl Into<String>,
        beginning_phoneme: impl Into<String>,
        speaker_id: impl Into<String>,
        correct_response_index: usize,
        response_choices: Vec<String>,
        sentence_id: impl Into<String>,
        congruence: Congruence,
    ) -> Result<Self, ConfigurationError> {
        let trial = Self {
            token: token.into(),
            beginning_phoneme: beginning_phoneme.into(),
            speaker_id: speaker_id.into(),
            correct_response_index,
            response_choices,
            kind: TrialKind::Sentence {
                sentence_id: sentence_id.into(),
                congruence,
            },
        };
        trial.check()?;
        Ok(trial)
    }

    /// Verify `0 <= correct_response_index < len(response_choices)`.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.response_choices.is_empty() {
            return Err(ConfigurationError::EmptyChoices {
                token: self.token.clone(),
            });
        }
        if self.correct_response_index >= self.response_choices.len() {
            return Err(ConfigurationError::CorrectIndexOutOfRange {
                token: self.token.clone(),
                index: self.correct_response_index,
                choices: self.response_choices.len(),
            });
        }
        Ok(())
    }

    pub fn category(&self) -> Category {
        match self.kind {
            TrialKind::Word => Category::Word,
            TrialKind::Sentence { .. } => Category::Sentence,
        }
    }

    /// Filename of the audio asset for this trial.
    pub fn sound_file_name(&self) -> String {
        match &self.kind {
            TrialKind::Word => format!("{}_{}.wav", self.token, self.speaker_id),
            TrialKind::Sentence { sentence_id, .. } => {
                format!("{}_{}_{}.wav", sentence_id, self.token, self.speaker_id)
            }
        }
    }

    /// Sentence metadata to copy onto a response, if this is a sentence trial.
    pub fn sentence_context(&self) -> Option<SentenceContext> {
        match &self.kind {
            TrialKind::Word => None,
            TrialKind::Sentence {
                sentence_id,
                congruence,
            } => Some(SentenceContext {
                sentence_id: sentence_id.clone(),
                congruence: *congruence,
            }),
        }
    }
}

/// An ordered collection of trials for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSet {
    pub key: TrialSetKey,
    /// Human-readable name.
    pub name: String,
    /// Trials in presentation order.
    pub trials: Vec<Trial>,
}

impl TrialSet {
    /// Build a trial set, checking every trial and its category.
    pub fn new(
        key: TrialSetKey,
        name: impl Into<String>,
        trials: Vec<Trial>,
    ) -> Result<Self, ConfigurationError> {
        for trial in &trials {
            trial.check()?;
            if trial.category() != key.category {
                return Err(ConfigurationError::CategoryMismatch {
                    token: trial.token.clone(),
                    key,
                });
            }
        }
        Ok(Self {
            key,
            name: name.into(),
            trials,
        })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

/// Sentence-only fields carried by a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceContext {
    #[serde(rename = "trial_sentence_id")]
    pub sentence_id: String,
    #[serde(rename = "trial_congruence")]
    pub congruence: Congruence,
}

/// A persisted answer of one subject to one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResponse {
    /// Batch this record was written in.
    pub submission_id: Uuid,
    pub subject_id: String,
    pub category: Category,
    pub position: Position,
    /// 0-based index of the trial within its set.
    pub trial_index: usize,
    pub trial_token: String,
    pub trial_beginning_phoneme: String,
    pub trial_speaker_id: String,
    /// Present exactly when the trial was a sentence trial.
    #[serde(flatten)]
    pub sentence: Option<SentenceContext>,
    /// The index the subject picked.
    pub user_response_index: i64,
    pub is_correct: bool,
    /// Subject-reported elapsed time for the trial.
    pub reaction_time: f64,
    /// Client-side time the response was recorded.
    pub timestamp: f64,
    /// Server time the batch was accepted.
    pub received_at: DateTime<Utc>,
}

impl TrialResponse {
    pub fn key(&self) -> ResponseKey {
        ResponseKey {
            subject_id: self.subject_id.clone(),
            set: TrialSetKey::new(self.category, self.position),
            trial_index: self.trial_index,
        }
    }

    pub fn trial_set_key(&self) -> TrialSetKey {
        TrialSetKey::new(self.category, self.position)
    }
}

/// Composite identity of a response: subject, phase, and trial index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseKey {
    pub subject_id: String,
    pub set: TrialSetKey,
    pub trial_index: usize,
}
