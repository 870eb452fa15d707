//! The `phonotest submit` command.

use std::path::PathBuf;

use anyhow::Result;

use phonotest_core::model::TrialSetKey;
use phonotest_core::validator::RawSubmission;

pub async fn execute(
    subject: String,
    phase: TrialSetKey,
    responses: String,
    reaction_times: String,
    timestamps: String,
    config: Option<PathBuf>,
) -> Result<()> {
    let experiment = super::load_experiment(config)?;
    let raw = RawSubmission {
        subject_id: subject,
        key: phase,
        responses,
        reaction_times,
        timestamps,
    };

    // Details are already logged; the caller only sees the public message.
    let receipt = experiment
        .submit(&raw)
        .await
        .map_err(|e| anyhow::anyhow!(e.public_message()))?;

    println!("Thank you! {} response(s) saved.", receipt.saved_count);
    println!("Submission: {}", receipt.submission_id);
    Ok(())
}
