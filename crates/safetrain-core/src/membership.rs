//! Committee membership and exclusion lookups.
//!
//! Both lookups soft-fail: a store error is logged and treated as "no
//! memberships, not excluded".

use std::collections::HashSet;

use crate::model::MembershipSummary;
use crate::traits::Repository;

/// Active committees and exclusion flag of one employee.
pub async fn resolve_membership(repo: &dyn Repository, employee_id: &str) -> MembershipSummary {
    match repo.committee_memberships(employee_id).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(
                employee_id,
                "membership lookup failed, treating as no memberships: {e}"
            );
            MembershipSummary::default()
        }
    }
}

/// Every excluded employee, resolved once for a batch.
pub async fn resolve_exclusions(repo: &dyn Repository) -> HashSet<String> {
    match repo.list_excluded_employees().await {
        Ok(excluded) => excluded,
        Err(e) => {
            tracing::warn!("exclusion lookup failed, treating nobody as excluded: {e}");
            HashSet::new()
        }
    }
}
