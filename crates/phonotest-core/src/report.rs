//! CSV result reports.
//!
//! One data row per group in wide layout, pretest columns then posttest
//! columns, so the pre/post comparison reads across a single line.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{Category, TrialResponse};
use crate::statistics::{aggregate, OrganizerKey, PositionStats, ResultSummary};

/// Fixed attachment name for downloaded reports.
pub const REPORT_FILENAME: &str = "results.csv";

/// MIME type of downloaded reports.
pub const REPORT_CONTENT_TYPE: &str = "text/csv";

/// Which of the four reports to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportKind {
    pub category: Category,
    pub organizer: OrganizerKey,
}

impl ReportKind {
    pub const fn new(category: Category, organizer: OrganizerKey) -> Self {
        Self {
            category,
            organizer,
        }
    }

    /// Map a download form's file-type selector to a report.
    ///
    /// `1` sentence×phoneme, `2` word×token, `3` sentence×token, `4` word×phoneme.
    pub fn from_selector(selector: &str) -> Result<Self, ValidationError> {
        match selector.trim() {
            "1" => Ok(Self::new(Category::Sentence, OrganizerKey::Phoneme)),
            "2" => Ok(Self::new(Category::Word, OrganizerKey::Token)),
            "3" => Ok(Self::new(Category::Sentence, OrganizerKey::Token)),
            "4" => Ok(Self::new(Category::Word, OrganizerKey::Phoneme)),
            other => Err(ValidationError::UnknownFileType(other.to_string())),
        }
    }
}

/// A rendered report ready to hand to a downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDownload {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

/// Aggregate `responses` and render the report as CSV.
pub fn generate_csv(responses: &[TrialResponse], kind: ReportKind) -> String {
    render_csv(&aggregate(responses, kind.category, kind.organizer))
}

/// Render an aggregated summary as CSV.
pub fn render_csv(summary: &ResultSummary) -> String {
    let mut csv = String::new();

    let mut header = vec![summary.organizer.to_string()];
    for position in ["pre", "post"] {
        for column in ["responses", "correct", "accuracy", "mean_rt", "subjects"] {
            header.push(format!("{position}_{column}"));
        }
    }
    header.push("accuracy_change".to_string());
    push_row(&mut csv, &header);

    for group in &summary.groups {
        let mut row = vec![group.key.clone()];
        push_position_cells(&mut row, &group.pre);
        push_position_cells(&mut row, &group.post);
        row.push(
            group
                .accuracy_change()
                .map(|d| format!("{d:+.4}"))
                .unwrap_or_default(),
        );
        push_row(&mut csv, &row);
    }

    csv
}

fn push_position_cells(row: &mut Vec<String>, stats: &PositionStats) {
    row.push(stats.responses.to_string());
    row.push(stats.correct.to_string());
    row.push(stats.accuracy.map(|a| format!("{a:.4}")).unwrap_or_default());
    row.push(
        stats
            .mean_reaction_time
            .map(|rt| format!("{rt:.3}"))
            .unwrap_or_default(),
    );
    row.push(stats.subjects.to_string());
}

fn push_row(csv: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            csv.push(',');
        }
        csv.push_str(&escape_field(field));
    }
    csv.push('\n');
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        let mut quoted = String::with_capacity(field.len() + 2);
        quoted.push('"');
        for c in field.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Congruence, Position, SentenceContext};
    use chrono::Utc;
    use uuid::Uuid;

    const HEADER_TAIL: &str = "pre_responses,pre_correct,pre_accuracy,pre_mean_rt,pre_subjects,\
post_responses,post_correct,post_accuracy,post_mean_rt,post_subjects,accuracy_change";

    fn response(
        token: &str,
        phoneme: &str,
        position: Position,
        correct: bool,
        rt: f64,
    ) -> TrialResponse {
        TrialResponse {
            submission_id: Uuid::nil(),
            subject_id: "subject-1".into(),
            category: Category::Sentence,
            position,
            trial_index: 0,
            trial_token: token.into(),
            trial_beginning_phoneme: phoneme.into(),
            trial_speaker_id: "s1".into(),
            sentence: Some(SentenceContext {
                sentence_id: "sent-01".into(),
                congruence: Congruence::Congruent,
            }),
            user_response_index: 0,
            is_correct: correct,
            reaction_time: rt,
            timestamp: 0.0,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn selector_mapping() {
        assert_eq!(
            ReportKind::from_selector("1").unwrap(),
            ReportKind::new(Category::Sentence, OrganizerKey::Phoneme)
        );
        assert_eq!(
            ReportKind::from_selector("2").unwrap(),
            ReportKind::new(Category::Word, OrganizerKey::Token)
        );
        assert_eq!(
            ReportKind::from_selector("3").unwrap(),
            ReportKind::new(Category::Sentence, OrganizerKey::Token)
        );
        assert_eq!(
            ReportKind::from_selector("4").unwrap(),
            ReportKind::new(Category::Word, OrganizerKey::Phoneme)
        );
        assert!(ReportKind::from_selector("5").is_err());
        assert!(ReportKind::from_selector("").is_err());
    }

    #[test]
    fn empty_data_yields_header_only() {
        let kind = ReportKind::new(Category::Word, OrganizerKey::Token);
        let csv = generate_csv(&[], kind);
        assert_eq!(csv, format!("token,{HEADER_TAIL}\n"));
    }

    #[test]
    fn renders_rows_with_fixed_precision() {
        let data = vec![
            response("bat", "b", Position::Pre, true, 600.0),
            response("bat", "b", Position::Pre, false, 700.0),
            response("bat", "b", Position::Pre, false, 701.0),
            response("bat", "b", Position::Post, true, 512.25),
            response("pat", "p", Position::Pre, true, 450.0),
        ];
        let kind = ReportKind::new(Category::Sentence, OrganizerKey::Phoneme);
        let csv = generate_csv(&data, kind);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], format!("phoneme,{HEADER_TAIL}"));
        assert_eq!(lines[1], "b,3,1,0.3333,667.000,1,1,1,1.0000,512.250,1,+0.6667");
        assert_eq!(lines[2], "p,1,1,1.0000,450.000,1,0,0,,,0,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn other_category_is_excluded() {
        let data = vec![response("bat", "b", Position::Pre, true, 1.0)];
        let csv = generate_csv(&data, ReportKind::new(Category::Word, OrganizerKey::Phoneme));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn repeated_exports_are_identical() {
        let data: Vec<_> = ["zap", "bat", "mat", "bat", "pat"]
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let position = if i % 2 == 0 { Position::Pre } else { Position::Post };
                response(t, &t[..1], position, i % 3 == 0, 400.0 + i as f64)
            })
            .collect();
        let kind = ReportKind::new(Category::Sentence, OrganizerKey::Token);
        let mut reversed = data.clone();
        reversed.reverse();

        assert_eq!(generate_csv(&data, kind), generate_csv(&data, kind));
        assert_eq!(generate_csv(&data, kind), generate_csv(&reversed, kind));
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }
}
