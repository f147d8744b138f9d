//! The record-store contract consumed by the engine.
//!
//! Implemented by the in-memory fixture store in this crate and by the HTTP
//! adapter in `safetrain-store`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    AppliedEvaluation, EvaluationTemplate, MembershipSummary, NewAnswerRecord,
    NewAppliedEvaluation, QuestionBankItem, TemplateQuestionLink,
};

/// Approved training scopes per employee.
///
/// `None` in a set marks an approval that was not tied to any training
/// session; it still counts as "has an approval".
pub type ApprovedScopes = HashMap<String, HashSet<Option<String>>>;

/// Narrow read/write access to the evaluation tables of the record store.
///
/// Every call goes to the store; implementations must not cache results.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Human-readable backend name (e.g. "airtable").
    fn name(&self) -> &str;

    /// Templates with `status = Active` and the given validity year.
    async fn list_active_templates(
        &self,
        year: i32,
    ) -> Result<Vec<EvaluationTemplate>, StoreError>;

    /// A single template by ID, regardless of status.
    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<EvaluationTemplate>, StoreError>;

    /// Active committee names of an employee plus their exclusion flag.
    async fn committee_memberships(
        &self,
        employee_id: &str,
    ) -> Result<MembershipSummary, StoreError>;

    /// IDs of every employee carrying the exclusion flag.
    async fn list_excluded_employees(&self) -> Result<HashSet<String>, StoreError>;

    /// Attempt rows of an employee for one template.
    ///
    /// Backends that cannot filter on linked scope fields may ignore
    /// `scope_id`; callers filter again after the fetch.
    async fn list_attempts(
        &self,
        employee_id: &str,
        template_id: &str,
        scope_id: Option<&str>,
    ) -> Result<Vec<AppliedEvaluation>, StoreError>;

    /// Approved attempts of the given employees, reduced to their scopes.
    async fn list_approved_attempts(
        &self,
        employee_ids: &[String],
        scope_ids: Option<&[String]>,
    ) -> Result<ApprovedScopes, StoreError>;

    /// Question links of a template in the order the store returns them.
    async fn list_template_question_links(
        &self,
        template_id: &str,
    ) -> Result<Vec<TemplateQuestionLink>, StoreError>;

    /// Question-bank items by ID. Unknown IDs are omitted from the result.
    async fn get_question_bank_items(
        &self,
        ids: &[String],
    ) -> Result<Vec<QuestionBankItem>, StoreError>;

    /// Append an attempt row and return its ID.
    async fn create_applied_evaluation(
        &self,
        evaluation: NewAppliedEvaluation,
    ) -> Result<String, StoreError>;

    /// Append answer rows for an attempt in a single call. Callers keep each
    /// call within the store's per-call record limit.
    async fn create_answer_records(
        &self,
        evaluation_id: &str,
        records: &[NewAnswerRecord],
    ) -> Result<(), StoreError>;
}
