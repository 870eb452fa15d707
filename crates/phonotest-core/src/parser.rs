//! TOML trial-set parser.
//!
//! Loads trial sets from TOML files and directories, and checks them for
//! issues that are legal but probably mistakes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Category, Congruence, Position, Trial, TrialSet, TrialSetKey};

/// Intermediate TOML structure for parsing trial-set files.
#[derive(Debug, Deserialize)]
struct TomlTrialSetFile {
    trial_set: TomlTrialSetHeader,
    #[serde(default)]
    trials: Vec<TomlTrial>,
}

#[derive(Debug, Deserialize)]
struct TomlTrialSetHeader {
    #[serde(default)]
    name: Option<String>,
    category: Category,
    position: Position,
}

#[derive(Debug, Deserialize)]
struct TomlTrial {
    token: String,
    beginning_phoneme: String,
    speaker_id: String,
    correct_response_index: usize,
    response_choices: Vec<String>,
    #[serde(default)]
    sentence_id: Option<String>,
    #[serde(default)]
    congruence: Option<Congruence>,
}

/// Parse a single TOML file into a `TrialSet`.
pub fn parse_trial_set(path: &Path) -> Result<TrialSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trial set file: {}", path.display()))?;

    parse_trial_set_str(&content, path)
}

/// Parse a TOML string into a `TrialSet` (useful for testing).
pub fn parse_trial_set_str(content: &str, source_path: &Path) -> Result<TrialSet> {
    let parsed: TomlTrialSetFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let key = TrialSetKey::new(parsed.trial_set.category, parsed.trial_set.position);

    let trials = parsed
        .trials
        .into_iter()
        .enumerate()
        .map(|(index, t)| -> Result<Trial> {
            let trial = match (key.category, t.sentence_id, t.congruence) {
                (Category::Word, None, None) => Trial::word(
                    t.token,
                    t.beginning_phoneme,
                    t.speaker_id,
                    t.correct_response_index,
                    t.response_choices,
                )?,
                (Category::Sentence, Some(sentence_id), Some(congruence)) => Trial::sentence(
                    t.token,
                    t.beginning_phoneme,
                    t.speaker_id,
                    t.correct_response_index,
                    t.response_choices,
                    sentence_id,
                    congruence,
                )?,
                (Category::Word, _, _) => anyhow::bail!(
                    "trial {index} ('{}'): word trials take no sentence_id or congruence",
                    t.token
                ),
                (Category::Sentence, _, _) => anyhow::bail!(
                    "trial {index} ('{}'): sentence trials need both sentence_id and congruence",
                    t.token
                ),
            };
            Ok(trial)
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("invalid trial in {}", source_path.display()))?;

    let name = parsed.trial_set.name.unwrap_or_else(|| key.to_string());
    Ok(TrialSet::new(key, name, trials)?)
}

/// Recursively load all `.toml` trial-set files from a directory, in path order.
///
/// A file that fails to parse aborts the whole load.
pub fn load_trial_set_directory(dir: &Path) -> Result<Vec<TrialSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            sets.extend(load_trial_set_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            tracing::debug!("loading trial set {}", path.display());
            sets.push(parse_trial_set(&path)?);
        }
    }

    Ok(sets)
}

/// A warning from trial-set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Token of the trial concerned (if applicable).
    pub token: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check a trial set for common issues.
pub fn validate_trial_set(set: &TrialSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.is_empty() {
        warnings.push(ValidationWarning {
            token: None,
            message: "trial set has no trials".into(),
        });
    }

    // Repeated tokens are fine across speakers, suspicious within one.
    let mut seen = std::collections::HashSet::new();
    for trial in &set.trials {
        if !seen.insert((&trial.token, &trial.speaker_id)) {
            warnings.push(ValidationWarning {
                token: Some(trial.token.clone()),
                message: format!(
                    "token '{}' appears more than once for speaker '{}'",
                    trial.token, trial.speaker_id
                ),
            });
        }
    }

    for trial in &set.trials {
        if trial.response_choices.len() < 2 {
            warnings.push(ValidationWarning {
                token: Some(trial.token.clone()),
                message: "only one response choice; every answer is correct".into(),
            });
        }
    }

    for trial in &set.trials {
        let mut labels = std::collections::HashSet::new();
        if trial.response_choices.iter().any(|c| !labels.insert(c)) {
            warnings.push(ValidationWarning {
                token: Some(trial.token.clone()),
                message: "response choices contain duplicate labels".into(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrialKind;
    use std::path::PathBuf;

    const WORD_PRE: &str = r#"
[trial_set]
name = "Word pretest"
category = "word"
position = "pre"

[[trials]]
token = "bat"
beginning_phoneme = "b"
speaker_id = "s1"
correct_response_index = 0
response_choices = ["bat", "pat"]

[[trials]]
token = "pat"
beginning_phoneme = "p"
speaker_id = "s1"
correct_response_index = 1
response_choices = ["bat", "pat"]
"#;

    const SENTENCE_POST: &str = r#"
[trial_set]
category = "sentence"
position = "post"

[[trials]]
token = "bat"
beginning_phoneme = "b"
speaker_id = "s2"
correct_response_index = 0
response_choices = ["bat", "pat"]
sentence_id = "sent-01"
congruence = "congruent"
"#;

    #[test]
    fn parse_word_set() {
        let set = parse_trial_set_str(WORD_PRE, &PathBuf::from("wpre.toml")).unwrap();
        assert_eq!(set.key, TrialSetKey::new(Category::Word, Position::Pre));
        assert_eq!(set.name, "Word pretest");
        assert_eq!(set.len(), 2);
        assert_eq!(set.trials[1].correct_response_index, 1);
        assert!(validate_trial_set(&set).is_empty());
    }

    #[test]
    fn parse_sentence_set_defaults_name() {
        let set = parse_trial_set_str(SENTENCE_POST, &PathBuf::from("spost.toml")).unwrap();
        assert_eq!(set.name, "sentence-post");
        assert!(matches!(
            &set.trials[0].kind,
            TrialKind::Sentence { sentence_id, congruence: Congruence::Congruent } if sentence_id == "sent-01"
        ));
    }

    #[test]
    fn sentence_trial_without_congruence_fails() {
        let toml = r#"
[trial_set]
category = "sentence"
position = "pre"

[[trials]]
token = "bat"
beginning_phoneme = "b"
speaker_id = "s2"
correct_response_index = 0
response_choices = ["bat", "pat"]
sentence_id = "sent-01"
"#;
        let err = parse_trial_set_str(toml, &PathBuf::from("spre.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("need both sentence_id and congruence"));
    }

    #[test]
    fn out_of_range_correct_index_fails() {
        let toml = WORD_PRE.replace("correct_response_index = 1", "correct_response_index = 5");
        let err = parse_trial_set_str(&toml, &PathBuf::from("wpre.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("out of range"));
    }

    #[test]
    fn validate_flags_single_choice_and_repeats() {
        let toml = r#"
[trial_set]
category = "word"
position = "post"

[[trials]]
token = "bat"
beginning_phoneme = "b"
speaker_id = "s1"
correct_response_index = 0
response_choices = ["bat"]

[[trials]]
token = "bat"
beginning_phoneme = "b"
speaker_id = "s1"
correct_response_index = 0
response_choices = ["bat", "bat"]
"#;
        let set = parse_trial_set_str(toml, &PathBuf::from("wpost.toml")).unwrap();
        let warnings = validate_trial_set(&set);
        assert!(warnings.iter().any(|w| w.message.contains("more than once")));
        assert!(warnings.iter().any(|w| w.message.contains("only one response choice")));
        assert!(warnings.iter().any(|w| w.message.contains("duplicate labels")));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_trial_set_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn load_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-spost.toml"), SENTENCE_POST).unwrap();
        std::fs::write(dir.path().join("a-wpre.toml"), WORD_PRE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sets = load_trial_set_directory(dir.path()).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].key.category, Category::Word);
        assert_eq!(sets[1].key.category, Category::Sentence);
    }
}
