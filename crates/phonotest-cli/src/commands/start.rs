//! The `phonotest start` command.

use std::path::PathBuf;

use anyhow::Result;

use phonotest_core::model::TrialSetKey;

pub fn execute(subject: String, phase: TrialSetKey, config: Option<PathBuf>) -> Result<()> {
    let experiment = super::load_experiment(config)?;
    let presentation = experiment
        .start_phase(&subject, phase)
        .map_err(|e| anyhow::anyhow!(e.public_message()))?;

    println!("{}", serde_json::to_string_pretty(&presentation)?);
    Ok(())
}
