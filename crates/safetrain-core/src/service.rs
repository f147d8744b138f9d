//! Request-level façade over the engine.
//!
//! Validates requests, fills in defaults and dispatches to the components.
//! Holds no state besides the repository handle and limits; every call reads
//! the store afresh.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::assembler::{assemble_template, AssembledTemplate};
use crate::completion::{check_completion, CompletionReport};
use crate::eligibility::{resolve_pending, PendingEvaluation};
use crate::error::{require_id, EngineError, EngineResult};
use crate::scoring::{record_submission, SubmissionOutcome, SubmissionRequest};
use crate::traits::Repository;

/// Limits imposed by the record store.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Most answer rows written per create call.
    pub answer_batch_size: usize,
    /// Most employee IDs per approved-attempt query.
    pub employee_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            answer_batch_size: 10,
            employee_chunk_size: 25,
        }
    }
}

/// Pending evaluations of one employee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub employee_id: String,
    /// Defaults to the current calendar year.
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub training_scope_id: Option<String>,
}

/// Completion check for a batch of employees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub employee_ids: Vec<String>,
    #[serde(default)]
    pub training_scope_ids: Option<Vec<String>>,
    /// Defaults to the current calendar year.
    #[serde(default)]
    pub year: Option<i32>,
}

/// The four request-level operations of the evaluation engine.
pub struct EvaluationService {
    repo: Arc<dyn Repository>,
    config: EngineConfig,
}

impl EvaluationService {
    pub fn new(repo: Arc<dyn Repository>, config: EngineConfig) -> Self {
        Self { repo, config }
    }

    pub fn repository(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    /// Templates an employee still owes or has already passed.
    pub async fn pending_evaluations(
        &self,
        request: &PendingRequest,
    ) -> EngineResult<Vec<PendingEvaluation>> {
        require_id(&request.employee_id, "employeeId")?;
        let scope_id = non_blank(request.training_scope_id.as_deref());
        let year = request.year.unwrap_or_else(current_year);
        Ok(resolve_pending(self.repo.as_ref(), &request.employee_id, year, scope_id).await?)
    }

    /// A template with its normalized questions, shuffled when the template
    /// asks for it.
    pub async fn template_with_questions(
        &self,
        template_id: &str,
    ) -> EngineResult<AssembledTemplate> {
        require_id(template_id, "templateId")?;
        assemble_template(self.repo.as_ref(), template_id).await
    }

    /// Grade and record an attempt.
    pub async fn submit(&self, request: SubmissionRequest) -> EngineResult<SubmissionOutcome> {
        record_submission(self.repo.as_ref(), request, self.config.answer_batch_size).await
    }

    /// Completion of many employees, optionally restricted to training
    /// sessions.
    pub async fn check_completion(
        &self,
        request: &CompletionRequest,
    ) -> EngineResult<CompletionReport> {
        if request.employee_ids.is_empty() {
            return Err(EngineError::InvalidRequest(
                "employeeIds must not be empty".into(),
            ));
        }
        for id in &request.employee_ids {
            require_id(id, "employeeIds[]")?;
        }

        let year = request.year.unwrap_or_else(current_year);
        Ok(check_completion(
            self.repo.as_ref(),
            &request.employee_ids,
            request.training_scope_ids.as_deref(),
            year,
            self.config.employee_chunk_size,
        )
        .await?)
    }
}

/// The current calendar year (UTC).
pub fn current_year() -> i32 {
    Utc::now().year()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
