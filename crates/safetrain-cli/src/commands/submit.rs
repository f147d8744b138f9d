//! The `safetrain submit` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use safetrain_core::scoring::SubmissionRequest;

use super::open_service;

pub async fn execute(file: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read submission: {}", file.display()))?;
    let request: SubmissionRequest = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse submission: {}", file.display()))?;
    let submitted = request.answers.len();

    let (backend, service) = open_service(config_path.as_deref())?;
    let outcome = service.submit(request).await?;
    backend.flush()?;

    if outcome.answers_persisted < submitted {
        eprintln!(
            "Warning: only {}/{} answers were saved",
            outcome.answers_persisted, submitted
        );
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
