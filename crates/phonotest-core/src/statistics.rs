//! Pre/post aggregate statistics over persisted responses.
//!
//! Responses of one category are grouped by phoneme or token and summarized
//! separately for the pretest and the posttest.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{Category, Position, TrialResponse};

/// Dimension responses are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizerKey {
    Phoneme,
    Token,
}

impl OrganizerKey {
    /// The grouping value of a response.
    pub fn value_of<'a>(&self, response: &'a TrialResponse) -> &'a str {
        match self {
            OrganizerKey::Phoneme => &response.trial_beginning_phoneme,
            OrganizerKey::Token => &response.trial_token,
        }
    }
}

impl fmt::Display for OrganizerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganizerKey::Phoneme => write!(f, "phoneme"),
            OrganizerKey::Token => write!(f, "token"),
        }
    }
}

impl FromStr for OrganizerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phoneme" => Ok(OrganizerKey::Phoneme),
            "token" => Ok(OrganizerKey::Token),
            other => Err(format!("unknown organizer: {other}")),
        }
    }
}

/// Summary of one group at one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStats {
    pub responses: usize,
    pub correct: usize,
    /// Distinct subjects contributing responses.
    pub subjects: usize,
    /// `correct / responses`, `None` when there are no responses.
    pub accuracy: Option<f64>,
    /// Mean reaction time, `None` when there are no responses.
    pub mean_reaction_time: Option<f64>,
}

impl PositionStats {
    fn from_responses(responses: &[&TrialResponse]) -> Self {
        let n = responses.len();
        let correct = responses.iter().filter(|r| r.is_correct).count();
        let subjects = responses
            .iter()
            .map(|r| r.subject_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let (accuracy, mean_reaction_time) = if n == 0 {
            (None, None)
        } else {
            let total_rt: f64 = responses.iter().map(|r| r.reaction_time).sum();
            (Some(correct as f64 / n as f64), Some(total_rt / n as f64))
        };
        Self {
            responses: n,
            correct,
            subjects,
            accuracy,
            mean_reaction_time,
        }
    }
}

/// Pre and post statistics for one grouping value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// The phoneme or token this group collects.
    pub key: String,
    pub pre: PositionStats,
    pub post: PositionStats,
}

impl GroupStats {
    /// Posttest accuracy minus pretest accuracy, when both exist.
    pub fn accuracy_change(&self) -> Option<f64> {
        Some(self.post.accuracy? - self.pre.accuracy?)
    }
}

/// Aggregated results for one category and organizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub category: Category,
    pub organizer: OrganizerKey,
    /// Groups in ascending key order.
    pub groups: Vec<GroupStats>,
}

impl ResultSummary {
    /// Short human-readable description, e.g. `word responses by phoneme`.
    pub fn title(&self) -> String {
        format!("{} responses by {}", self.category, self.organizer)
    }
}

/// Group all responses of `category` by `organizer`.
///
/// Responses of other categories are ignored. Only groups with at least one
/// response appear, ordered by key so repeated runs agree exactly.
pub fn aggregate(
    responses: &[TrialResponse],
    category: Category,
    organizer: OrganizerKey,
) -> ResultSummary {
    let mut grouped: BTreeMap<&str, (Vec<&TrialResponse>, Vec<&TrialResponse>)> = BTreeMap::new();
    for r in responses.iter().filter(|r| r.category == category) {
        let entry = grouped.entry(organizer.value_of(r)).or_default();
        match r.position {
            Position::Pre => entry.0.push(r),
            Position::Post => entry.1.push(r),
        }
    }

    let groups = grouped
        .into_iter()
        .map(|(key, (pre, post))| GroupStats {
            key: key.to_string(),
            pre: PositionStats::from_responses(&pre),
            post: PositionStats::from_responses(&post),
        })
        .collect();

    ResultSummary {
        category,
        organizer,
        groups,
    }
}
