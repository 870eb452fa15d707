//! The `phonotest export` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

pub async fn execute(
    password: String,
    file_type: String,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let experiment = super::load_experiment(config)?;
    let download = experiment
        .download_report(&password, &file_type)
        .await
        .map_err(|e| anyhow::anyhow!(e.public_message()))?;

    match output {
        Some(path) => {
            std::fs::write(&path, &download.body)
                .with_context(|| format!("failed to write report: {}", path.display()))?;
            eprintln!("Wrote {} to {}", download.filename, path.display());
        }
        None => print!("{}", download.body),
    }

    Ok(())
}
