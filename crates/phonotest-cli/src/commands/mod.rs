//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use phonotest_core::experiment::Experiment;
use phonotest_core::registry::TrialSetRegistry;

pub mod export;
pub mod hash_secret;
pub mod init;
pub mod start;
pub mod submit;
pub mod summary;
pub mod validate;

/// Load config, trial sets, and store, and assemble the experiment service.
pub(crate) fn load_experiment(config_path: Option<PathBuf>) -> Result<Experiment> {
    let config = phonotest_store::load_config_from(config_path.as_deref())?;
    let registry = TrialSetRegistry::load(&config.trial_sets_dir).with_context(|| {
        format!(
            "failed to load trial sets from {}",
            config.trial_sets_dir.display()
        )
    })?;
    let store = phonotest_store::create_store(&config.store);
    tracing::debug!(store = store.name(), "opened response store");

    Ok(Experiment::new(
        Arc::new(registry),
        store,
        config.experiment_config()?,
    ))
}
