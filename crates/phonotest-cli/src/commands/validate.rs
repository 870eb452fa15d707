//! The `phonotest validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use phonotest_core::parser::{load_trial_set_directory, parse_trial_set, validate_trial_set};
use phonotest_core::registry::TrialSetRegistry;

pub fn execute(trial_sets_path: PathBuf) -> Result<()> {
    let is_dir = trial_sets_path.is_dir();
    let sets = if is_dir {
        load_trial_set_directory(&trial_sets_path)?
    } else {
        vec![parse_trial_set(&trial_sets_path)?]
    };

    let mut total_warnings = 0;

    for set in &sets {
        println!("Trial set: {} [{}] ({} trials)", set.name, set.key, set.len());

        let warnings = validate_trial_set(set);
        for w in &warnings {
            let prefix = w
                .token
                .as_ref()
                .map(|token| format!("  [{token}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    // A directory must hold exactly the four phases to be runnable.
    if is_dir {
        TrialSetRegistry::new(sets).with_context(|| {
            format!(
                "{} cannot be used as a trial-set directory",
                trial_sets_path.display()
            )
        })?;
    }

    if total_warnings == 0 {
        println!("All trial sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
