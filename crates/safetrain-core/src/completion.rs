//! Evaluation completion for many employees at once.
//!
//! Used to gate signature flows: an employee is complete when excluded, or
//! when they hold an approval (in one of the requested training sessions, if
//! any were given).

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::membership::resolve_exclusions;
use crate::traits::{ApprovedScopes, Repository};

/// Completion of each requested employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    /// Whether any active template exists for the year.
    pub has_evaluations: bool,
    pub results: BTreeMap<String, bool>,
}

/// Decide completion for a batch of employees.
///
/// Approved attempts are fetched in chunks of at most `chunk_size`
/// employee IDs.
pub async fn check_completion(
    repo: &dyn Repository,
    employee_ids: &[String],
    scope_ids: Option<&[String]>,
    year: i32,
    chunk_size: usize,
) -> Result<CompletionReport, StoreError> {
    let excluded = resolve_exclusions(repo).await;

    if repo.list_active_templates(year).await?.is_empty() {
        tracing::info!(year, "no active templates, every employee is complete");
        return Ok(CompletionReport {
            has_evaluations: false,
            results: employee_ids.iter().map(|id| (id.clone(), true)).collect(),
        });
    }

    let scope_ids = scope_ids.filter(|s| !s.is_empty());

    let unique = unique_ids(employee_ids.iter().filter(|id| !excluded.contains(*id)));

    let mut approved = ApprovedScopes::new();
    for chunk in unique.chunks(chunk_size.max(1)) {
        for (employee_id, scopes) in repo.list_approved_attempts(chunk, scope_ids).await? {
            approved.entry(employee_id).or_default().extend(scopes);
        }
    }

    let requested: Option<HashSet<&str>> =
        scope_ids.map(|ids| ids.iter().map(String::as_str).collect());

    let results: BTreeMap<String, bool> = employee_ids
        .iter()
        .map(|id| {
            let complete = if excluded.contains(id) {
                true
            } else {
                match (approved.get(id), &requested) {
                    (None, _) => false,
                    (Some(scopes), Some(requested)) => scopes
                        .iter()
                        .flatten()
                        .any(|scope| requested.contains(scope.as_str())),
                    (Some(scopes), None) => !scopes.is_empty(),
                }
            };
            (id.clone(), complete)
        })
        .collect();

    tracing::info!(
        employees = employee_ids.len(),
        complete = results.values().filter(|done| **done).count(),
        "completion checked"
    );

    Ok(CompletionReport {
        has_evaluations: true,
        results,
    })
}

/// IDs with duplicates removed, first occurrence kept.
pub(crate) fn unique_ids<'a>(ids: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailPoint, MemoryRepository, StoreSnapshot};
    use crate::model::{AppliedEvaluation, EvaluationStatus, EvaluationTemplate, RecordStatus};
    use chrono::NaiveDate;

    fn template() -> EvaluationTemplate {
        EvaluationTemplate {
            id: "tpl-1".into(),
            code: "IND-01".into(),
            name: "Induction".into(),
            evaluation_type: String::new(),
            population_target: "All".into(),
            status: RecordStatus::Active,
            validity_year: 2026,
            pass_threshold_percent: 60.0,
            time_limit_minutes: None,
            max_attempts: 1,
            randomize_questions: false,
            show_feedback: false,
        }
    }

    fn attempt(employee: &str, scope: Option<&str>, status: EvaluationStatus) -> AppliedEvaluation {
        AppliedEvaluation {
            id: format!("{employee}-{scope:?}"),
            template_id: "tpl-1".into(),
            employee_id: employee.into(),
            employee_name: String::new(),
            document_id: String::new(),
            role_label: String::new(),
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            score_obtained: 1.0,
            score_max: 1.0,
            percentage: 100.0,
            status,
            attempt_number: 1,
            training_scope_id: scope.map(str::to_string),
            time_spent_minutes: None,
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn repo() -> MemoryRepository {
        MemoryRepository::new(StoreSnapshot {
            templates: vec![template()],
            excluded_employees: vec!["boss".into()],
            evaluations: vec![
                attempt("ana", Some("s1"), EvaluationStatus::Approved),
                attempt("luis", None, EvaluationStatus::Approved),
                attempt("marta", Some("s2"), EvaluationStatus::NotApproved),
            ],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn no_active_templates_means_everyone_complete() {
        let repo = MemoryRepository::default();
        let report = check_completion(&repo, &ids(&["ana", "pedro"]), None, 2026, 10)
            .await
            .unwrap();
        assert!(!report.has_evaluations);
        assert!(report.results.values().all(|done| *done));
        assert_eq!(report.results.len(), 2);
        assert_eq!(repo.approved_queries(), 0);
    }

    #[tokio::test]
    async fn any_approval_counts_without_scopes() {
        let report = check_completion(
            &repo(),
            &ids(&["ana", "luis", "marta", "pedro", "boss"]),
            None,
            2026,
            10,
        )
        .await
        .unwrap();
        assert!(report.has_evaluations);
        assert!(report.results["ana"]);
        assert!(report.results["luis"]);
        assert!(!report.results["marta"]);
        assert!(!report.results["pedro"]);
        assert!(report.results["boss"]);
    }

    #[tokio::test]
    async fn requested_scopes_must_intersect() {
        let scopes = ids(&["s1"]);
        let report = check_completion(
            &repo(),
            &ids(&["ana", "luis", "boss"]),
            Some(&scopes),
            2026,
            10,
        )
        .await
        .unwrap();
        assert!(report.results["ana"]);
        assert!(!report.results["luis"]);
        assert!(report.results["boss"]);
    }

    #[tokio::test]
    async fn employee_ids_are_chunked() {
        let repo = repo();
        let employees: Vec<String> = (0..7).map(|i| format!("emp-{i}")).collect();
        check_completion(&repo, &employees, None, 2026, 3)
            .await
            .unwrap();
        assert_eq!(repo.approved_queries(), 3);
    }

    #[tokio::test]
    async fn exclusion_failure_soft_fails() {
        let repo = repo();
        repo.fail(FailPoint::Exclusions);
        let report = check_completion(&repo, &ids(&["boss"]), None, 2026, 10)
            .await
            .unwrap();
        assert!(!report.results["boss"]);
    }

    #[tokio::test]
    async fn approved_query_failure_propagates() {
        let repo = repo();
        repo.fail(FailPoint::ApprovedAttempts);
        assert!(check_completion(&repo, &ids(&["ana"]), None, 2026, 10)
            .await
            .is_err());
    }

    #[test]
    fn unique_ids_keep_first_occurrence() {
        let ids: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_ids(&ids), vec!["b", "a", "c"]);

        let many: Vec<String> = (0..10_000).map(|i| format!("emp-{}", i % 100)).collect();
        let unique = unique_ids(&many);
        assert_eq!(unique.len(), 100);
        assert_eq!(unique[0], "emp-0");
        assert_eq!(unique[99], "emp-99");
    }
}
