//! Pending evaluations of a single employee.

use serde::{Deserialize, Serialize};

use crate::attempts::track_attempts;
use crate::error::StoreError;
use crate::membership::resolve_membership;
use crate::model::EvaluationTemplate;
use crate::traits::Repository;

/// A template the employee has to take, or has already passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEvaluation {
    pub template: EvaluationTemplate,
    pub attempts_used: u32,
    pub attempts_allowed: u32,
    pub approved: bool,
    /// Whether another attempt may be started now.
    pub available: bool,
}

/// Resolve which active templates of `year` apply to an employee and where
/// they stand on each.
///
/// Approved templates stay in the list (marked approved, not available);
/// templates with all attempts used and no approval are dropped. An
/// excluded employee owes nothing.
pub async fn resolve_pending(
    repo: &dyn Repository,
    employee_id: &str,
    year: i32,
    scope_id: Option<&str>,
) -> Result<Vec<PendingEvaluation>, StoreError> {
    let membership = resolve_membership(repo, employee_id).await;
    if membership.excluded {
        tracing::info!(employee_id, "employee is excluded from evaluations");
        return Ok(Vec::new());
    }

    let templates = repo.list_active_templates(year).await?;
    let mut pending = Vec::new();

    for template in templates {
        if !template.targets(&membership.committees) {
            tracing::debug!(
                employee_id,
                template_id = %template.id,
                population_target = %template.population_target,
                "template does not target employee"
            );
            continue;
        }

        let state = track_attempts(repo, employee_id, &template.id, scope_id).await?;
        let available = state.is_available(template.max_attempts);
        if !available && !state.approved {
            tracing::debug!(
                employee_id,
                template_id = %template.id,
                "attempts exhausted without approval"
            );
            continue;
        }

        pending.push(PendingEvaluation {
            attempts_used: state.attempts_used,
            attempts_allowed: template.max_attempts,
            approved: state.approved,
            available,
            template,
        });
    }

    tracing::info!(
        employee_id,
        year,
        count = pending.len(),
        "pending evaluations resolved"
    );
    Ok(pending)
}
