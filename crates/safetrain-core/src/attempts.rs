//! Attempt history of an employee for one template.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::AppliedEvaluation;
use crate::traits::Repository;

/// Aggregated attempt history for an (employee, template[, scope]) key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptState {
    /// Highest attempt number recorded, 0 when there are none.
    pub attempts_used: u32,
    /// Whether any recorded attempt was approved.
    pub approved: bool,
}

impl AttemptState {
    pub fn from_attempts<'a>(attempts: impl IntoIterator<Item = &'a AppliedEvaluation>) -> Self {
        attempts
            .into_iter()
            .fold(AttemptState::default(), |state, attempt| AttemptState {
                attempts_used: state.attempts_used.max(attempt.attempt_number),
                approved: state.approved || attempt.status.is_approved(),
            })
    }

    /// Whether another attempt may still be taken.
    pub fn is_available(&self, max_attempts: u32) -> bool {
        !self.approved && self.attempts_used < max_attempts
    }
}

/// Read and aggregate the attempts of an employee for a template.
///
/// With a `scope_id`, only attempts tied to that training session count.
/// The scope filter is applied here after the fetch, whatever the backend
/// did with it.
pub async fn track_attempts(
    repo: &dyn Repository,
    employee_id: &str,
    template_id: &str,
    scope_id: Option<&str>,
) -> Result<AttemptState, StoreError> {
    let attempts = repo.list_attempts(employee_id, template_id, scope_id).await?;

    let state = AttemptState::from_attempts(
        attempts
            .iter()
            .filter(|a| a.template_id == template_id)
            .filter(|a| scope_id.is_none() || a.training_scope_id.as_deref() == scope_id),
    );

    tracing::debug!(
        employee_id,
        template_id,
        scope_id,
        attempts_used = state.attempts_used,
        approved = state.approved,
        "attempt history resolved"
    );
    Ok(state)
}
