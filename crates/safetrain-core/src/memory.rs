//! In-memory repository.
//!
//! Backs the `fixture` store type of the CLI and the engine's tests. Data is
//! a [`StoreSnapshot`] that can be loaded from and saved to JSON. Individual
//! calls can be made to fail in order to exercise the engine's soft-fail and
//! partial-persistence paths.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    AnswerRecord, AppliedEvaluation, CommitteeMembership, EvaluationTemplate, MembershipSummary,
    NewAnswerRecord, NewAppliedEvaluation, QuestionBankItem, RecordStatus, TemplateQuestionLink,
};
use crate::options::OptionSet;
use crate::traits::{ApprovedScopes, Repository};

/// Every table the engine reads or writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub templates: Vec<EvaluationTemplate>,
    #[serde(default)]
    pub question_links: Vec<TemplateQuestionLink>,
    #[serde(default)]
    pub questions: Vec<QuestionBankItem>,
    #[serde(default)]
    pub memberships: Vec<CommitteeMembership>,
    #[serde(default)]
    pub excluded_employees: Vec<String>,
    #[serde(default)]
    pub evaluations: Vec<AppliedEvaluation>,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
}

impl StoreSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse fixture JSON: {}", path.display()))
    }

    /// Save the snapshot as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize fixture")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write fixture to {}", path.display()))?;
        Ok(())
    }

    /// Check cross-table consistency. Problems are reported, not fixed.
    pub fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let template_ids: HashSet<&str> = self.templates.iter().map(|t| t.id.as_str()).collect();
        let question_ids: HashSet<&str> = self.questions.iter().map(|q| q.id.as_str()).collect();

        for template in &self.templates {
            if template.max_attempts == 0 {
                warnings.push(ValidationWarning::new(
                    &template.id,
                    format!("template '{}' allows no attempts", template.code),
                ));
            }
        }

        let mut orders = HashSet::new();
        for link in &self.question_links {
            if !template_ids.contains(link.template_id.as_str()) {
                warnings.push(ValidationWarning::new(
                    &link.id,
                    format!("links unknown template '{}'", link.template_id),
                ));
            }
            if !question_ids.contains(link.question_id.as_str()) {
                warnings.push(ValidationWarning::new(
                    &link.id,
                    format!("links unknown question '{}'", link.question_id),
                ));
            }
            if !orders.insert((link.template_id.as_str(), link.order)) {
                warnings.push(ValidationWarning::new(
                    &link.id,
                    format!(
                        "duplicate order {} in template '{}'",
                        link.order, link.template_id
                    ),
                ));
            }
        }

        for question in &self.questions {
            let options = OptionSet::parse(&question.options_raw);
            if let OptionSet::Unparseable(raw) = &options {
                warnings.push(ValidationWarning::new(
                    &question.id,
                    format!("options are neither a list nor key/text pairs: {raw}"),
                ));
            }
            let answer = question.correct_answer_raw.trim();
            if matches!(options, OptionSet::Keyed(_))
                && !answer.is_empty()
                && !answer.starts_with('[')
                && options.text_for_key(answer).is_none()
            {
                warnings.push(ValidationWarning::new(
                    &question.id,
                    format!("correct answer '{answer}' matches no option key"),
                ));
            }
        }

        warnings
    }
}

/// A consistency problem found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    pub record_id: String,
    pub message: String,
}

impl ValidationWarning {
    fn new(record_id: &str, message: String) -> Self {
        Self {
            record_id: record_id.to_string(),
            message,
        }
    }
}

/// Repository calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ActiveTemplates,
    TemplateLookup,
    Memberships,
    Exclusions,
    Attempts,
    ApprovedAttempts,
    QuestionLinks,
    QuestionBank,
    CreateEvaluation,
}

/// A repository holding all tables in memory.
pub struct MemoryRepository {
    data: Mutex<StoreSnapshot>,
    failures: Mutex<HashSet<FailPoint>>,
    /// Outcome of upcoming `create_answer_records` calls; `false` fails the call.
    answer_batch_plan: Mutex<VecDeque<bool>>,
    answer_batch_calls: AtomicU32,
    approved_queries: AtomicU32,
}

impl MemoryRepository {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            data: Mutex::new(snapshot),
            failures: Mutex::new(HashSet::new()),
            answer_batch_plan: Mutex::new(VecDeque::new()),
            answer_batch_calls: AtomicU32::new(0),
            approved_queries: AtomicU32::new(0),
        }
    }

    /// Load a repository from a JSON fixture file.
    pub fn load_json(path: &Path) -> Result<Self> {
        Ok(Self::new(StoreSnapshot::load_json(path)?))
    }

    /// A copy of the current tables.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.data().clone()
    }

    /// Make every call of the given kind fail until [`Self::heal`] is called.
    pub fn fail(&self, point: FailPoint) {
        lock(&self.failures).insert(point);
    }

    pub fn heal(&self, point: FailPoint) {
        lock(&self.failures).remove(&point);
    }

    /// Script the outcome of the next answer batches, in call order.
    /// Calls beyond the plan succeed.
    pub fn plan_answer_batches(&self, outcomes: &[bool]) {
        lock(&self.answer_batch_plan).extend(outcomes.iter().copied());
    }

    /// Number of `create_answer_records` calls made.
    pub fn answer_batch_calls(&self) -> u32 {
        self.answer_batch_calls.load(Ordering::Relaxed)
    }

    /// Number of `list_approved_attempts` calls made.
    pub fn approved_queries(&self) -> u32 {
        self.approved_queries.load(Ordering::Relaxed)
    }

    fn data(&self) -> MutexGuard<'_, StoreSnapshot> {
        lock(&self.data)
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        if lock(&self.failures).contains(&point) {
            return Err(StoreError::Network(format!("injected failure: {point:?}")));
        }
        Ok(())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new(StoreSnapshot::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_record_id() -> String {
    format!("rec{}", Uuid::new_v4().simple())
}

#[async_trait]
impl Repository for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_active_templates(
        &self,
        year: i32,
    ) -> Result<Vec<EvaluationTemplate>, StoreError> {
        self.check(FailPoint::ActiveTemplates)?;
        Ok(self
            .data()
            .templates
            .iter()
            .filter(|t| t.status == RecordStatus::Active && t.validity_year == year)
            .cloned()
            .collect())
    }

    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<EvaluationTemplate>, StoreError> {
        self.check(FailPoint::TemplateLookup)?;
        Ok(self
            .data()
            .templates
            .iter()
            .find(|t| t.id == template_id)
            .cloned())
    }

    async fn committee_memberships(
        &self,
        employee_id: &str,
    ) -> Result<MembershipSummary, StoreError> {
        self.check(FailPoint::Memberships)?;
        let data = self.data();
        let committees = data
            .memberships
            .iter()
            .filter(|m| m.employee_id == employee_id && m.status == RecordStatus::Active)
            .map(|m| m.committee_name.clone())
            .collect();
        let excluded = data.excluded_employees.iter().any(|id| id == employee_id);
        Ok(MembershipSummary {
            committees,
            excluded,
        })
    }

    async fn list_excluded_employees(&self) -> Result<HashSet<String>, StoreError> {
        self.check(FailPoint::Exclusions)?;
        Ok(self.data().excluded_employees.iter().cloned().collect())
    }

    async fn list_attempts(
        &self,
        employee_id: &str,
        template_id: &str,
        scope_id: Option<&str>,
    ) -> Result<Vec<AppliedEvaluation>, StoreError> {
        self.check(FailPoint::Attempts)?;
        Ok(self
            .data()
            .evaluations
            .iter()
            .filter(|e| e.employee_id == employee_id && e.template_id == template_id)
            .filter(|e| scope_id.is_none() || e.training_scope_id.as_deref() == scope_id)
            .cloned()
            .collect())
    }

    async fn list_approved_attempts(
        &self,
        employee_ids: &[String],
        scope_ids: Option<&[String]>,
    ) -> Result<ApprovedScopes, StoreError> {
        self.approved_queries.fetch_add(1, Ordering::Relaxed);
        self.check(FailPoint::ApprovedAttempts)?;

        let mut approved = ApprovedScopes::new();
        for evaluation in self.data().evaluations.iter() {
            if !evaluation.status.is_approved() || !employee_ids.contains(&evaluation.employee_id)
            {
                continue;
            }
            if let Some(scopes) = scope_ids {
                let in_scope = evaluation
                    .training_scope_id
                    .as_ref()
                    .is_some_and(|s| scopes.contains(s));
                if !in_scope {
                    continue;
                }
            }
            approved
                .entry(evaluation.employee_id.clone())
                .or_default()
                .insert(evaluation.training_scope_id.clone());
        }
        Ok(approved)
    }

    async fn list_template_question_links(
        &self,
        template_id: &str,
    ) -> Result<Vec<TemplateQuestionLink>, StoreError> {
        self.check(FailPoint::QuestionLinks)?;
        Ok(self
            .data()
            .question_links
            .iter()
            .filter(|l| l.template_id == template_id)
            .cloned()
            .collect())
    }

    async fn get_question_bank_items(
        &self,
        ids: &[String],
    ) -> Result<Vec<QuestionBankItem>, StoreError> {
        self.check(FailPoint::QuestionBank)?;
        Ok(self
            .data()
            .questions
            .iter()
            .filter(|q| ids.contains(&q.id))
            .cloned()
            .collect())
    }

    async fn create_applied_evaluation(
        &self,
        evaluation: NewAppliedEvaluation,
    ) -> Result<String, StoreError> {
        self.check(FailPoint::CreateEvaluation)?;
        let id = new_record_id();
        self.data().evaluations.push(evaluation.into_record(id.clone()));
        Ok(id)
    }

    async fn create_answer_records(
        &self,
        evaluation_id: &str,
        records: &[NewAnswerRecord],
    ) -> Result<(), StoreError> {
        self.answer_batch_calls.fetch_add(1, Ordering::Relaxed);
        let succeed = lock(&self.answer_batch_plan).pop_front().unwrap_or(true);
        if !succeed {
            return Err(StoreError::Api {
                status: 422,
                message: "injected answer batch failure".into(),
            });
        }

        let mut data = self.data();
        for record in records {
            data.answers
                .push(record.clone().into_record(new_record_id(), evaluation_id));
        }
        Ok(())
    }
}
