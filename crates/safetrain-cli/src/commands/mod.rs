pub mod check;
pub mod init;
pub mod pending;
pub mod quiz;
pub mod submit;
pub mod validate;

use std::path::Path;

use anyhow::Result;

use safetrain_core::EvaluationService;
use safetrain_store::{create_backend, load_config_from, Backend};

/// Load config and open the configured store.
fn open_service(config_path: Option<&Path>) -> Result<(Backend, EvaluationService)> {
    let config = load_config_from(config_path)?;
    let backend = create_backend(&config)?;
    tracing::debug!(store = backend.repository().name(), "store opened");
    let service = EvaluationService::new(backend.repository(), config.engine_config());
    Ok((backend, service))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
