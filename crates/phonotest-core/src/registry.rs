//! The read-only registry of the four trial sets.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use crate::error::ConfigurationError;
use crate::model::{TrialSet, TrialSetKey};
use crate::parser::load_trial_set_directory;

/// Holds exactly one trial set per [`TrialSetKey`].
///
/// Built once at startup and shared behind an `Arc`; never mutated after.
#[derive(Debug, Clone)]
pub struct TrialSetRegistry {
    sets: HashMap<TrialSetKey, TrialSet>,
}

impl TrialSetRegistry {
    /// Build a registry, requiring every key to appear exactly once.
    pub fn new(sets: Vec<TrialSet>) -> Result<Self, ConfigurationError> {
        let mut map = HashMap::with_capacity(TrialSetKey::ALL.len());
        for set in sets {
            let key = set.key;
            if map.insert(key, set).is_some() {
                return Err(ConfigurationError::DuplicateTrialSet(key));
            }
        }
        if let Some(missing) = TrialSetKey::ALL.iter().find(|k| !map.contains_key(*k)) {
            return Err(ConfigurationError::MissingTrialSet(*missing));
        }
        Ok(Self { sets: map })
    }

    /// Load all trial sets under `dir` and build the registry.
    pub fn load(dir: &Path) -> Result<Self> {
        let sets = load_trial_set_directory(dir)?;
        let registry = Self::new(sets)?;
        tracing::info!(
            trials = registry.total_trials(),
            "loaded trial sets from {}",
            dir.display()
        );
        Ok(registry)
    }

    /// The trial set for `key`.
    ///
    /// Construction guarantees all four keys are present, so this cannot miss.
    pub fn get(&self, key: TrialSetKey) -> &TrialSet {
        &self.sets[&key]
    }

    /// All sets in [`TrialSetKey::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &TrialSet> {
        TrialSetKey::ALL.iter().map(|k| &self.sets[k])
    }

    pub fn total_trials(&self) -> usize {
        self.sets.values().map(TrialSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Position, Trial};

    fn set(key: TrialSetKey) -> TrialSet {
        let trials = match key.category {
            Category::Word => {
                vec![Trial::word("bat", "b", "s1", 0, vec!["bat".into(), "pat".into()]).unwrap()]
            }
            Category::Sentence => vec![],
        };
        TrialSet::new(key, key.to_string(), trials).unwrap()
    }

    #[test]
    fn builds_with_all_four_sets() {
        let registry =
            TrialSetRegistry::new(TrialSetKey::ALL.iter().map(|k| set(*k)).collect()).unwrap();
        let key = TrialSetKey::new(Category::Word, Position::Post);
        assert_eq!(registry.get(key).key, key);
        assert_eq!(registry.total_trials(), 2);
        let order: Vec<_> = registry.iter().map(|s| s.key).collect();
        assert_eq!(order, TrialSetKey::ALL.to_vec());
    }

    #[test]
    fn missing_set_is_configuration_error() {
        let sets = TrialSetKey::ALL[..3].iter().map(|k| set(*k)).collect();
        let err = TrialSetRegistry::new(sets).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingTrialSet(k) if k == TrialSetKey::ALL[3]
        ));
    }

    #[test]
    fn duplicate_set_is_configuration_error() {
        let mut sets: Vec<_> = TrialSetKey::ALL.iter().map(|k| set(*k)).collect();
        sets.push(set(TrialSetKey::ALL[0]));
        assert!(matches!(
            TrialSetRegistry::new(sets).unwrap_err(),
            ConfigurationError::DuplicateTrialSet(_)
        ));
    }
}
