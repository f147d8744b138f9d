//! Grading and persistence of a submitted attempt.
//!
//! Per-answer correctness and points are declared by the client; the engine
//! sums them, grades the total against the template's threshold and appends
//! the attempt and its answers to the store.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{require_id, EngineResult};
use crate::model::{
    Employee, EvaluationStatus, NewAnswerRecord, NewAppliedEvaluation, DEFAULT_PASS_THRESHOLD,
};
use crate::traits::Repository;

/// One answered question as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    /// Raw answer. A JSON list (multi-select) is stored as its JSON text.
    #[serde(default, deserialize_with = "answer_text")]
    pub answer_given: String,
    pub is_correct: bool,
    #[serde(default)]
    pub points_awarded: f64,
    #[serde(default)]
    pub time_spent_seconds: Option<u32>,
    #[serde(default)]
    pub presented_order: Option<u32>,
}

fn answer_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// A graded attempt as sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub template_id: String,
    pub employee: Employee,
    #[serde(default)]
    pub training_scope_id: Option<String>,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
    /// Chosen by the client from the attempt history it read; not checked
    /// against concurrent submissions.
    pub attempt_number: u32,
    pub score_max: f64,
    #[serde(default)]
    pub time_spent_minutes: Option<f64>,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl SubmissionRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_id(&self.template_id, "templateId")?;
        require_id(&self.employee.id, "employee.id")?;
        for answer in &self.answers {
            require_id(&answer.question_id, "answers[].questionId")?;
        }
        Ok(())
    }
}

/// Result of a recorded submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub evaluation_id: String,
    pub score_obtained: f64,
    pub score_max: f64,
    pub percentage: f64,
    pub status: EvaluationStatus,
    pub pass_threshold_percent: f64,
    /// Answer rows actually written; lower than the number submitted when a
    /// batch failed.
    pub answers_persisted: usize,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score as a percentage of the maximum, rounded to two decimals. A
/// non-positive maximum scores 0.
pub fn score_percentage(obtained: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    round2(obtained / max * 100.0)
}

/// The pass threshold of a template, or the default when it cannot be read.
pub async fn resolve_threshold(repo: &dyn Repository, template_id: &str) -> f64 {
    match repo.get_template(template_id).await {
        Ok(Some(template)) => template.pass_threshold_percent,
        Ok(None) => {
            tracing::warn!(
                template_id,
                "template not found while scoring, using default threshold"
            );
            DEFAULT_PASS_THRESHOLD
        }
        Err(e) => {
            tracing::warn!(
                template_id,
                "threshold lookup failed, using default threshold: {e}"
            );
            DEFAULT_PASS_THRESHOLD
        }
    }
}

/// Grade a submission and append it to the store.
///
/// The attempt row is written first. Answers follow in batches of at most
/// `answer_batch_size`; a failed batch is logged and skipped, and the
/// attempt row and earlier batches stay in place.
pub async fn record_submission(
    repo: &dyn Repository,
    request: SubmissionRequest,
    answer_batch_size: usize,
) -> EngineResult<SubmissionOutcome> {
    request.validate()?;

    let score_obtained: f64 = request.answers.iter().map(|a| a.points_awarded).sum();
    let percentage = score_percentage(score_obtained, request.score_max);
    let threshold = resolve_threshold(repo, &request.template_id).await;
    let status = EvaluationStatus::from_percentage(percentage, threshold);

    let employee_id = request.employee.id.clone();
    let evaluation_id = repo
        .create_applied_evaluation(NewAppliedEvaluation {
            template_id: request.template_id.clone(),
            employee: request.employee,
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            score_obtained,
            score_max: request.score_max,
            percentage,
            status,
            attempt_number: request.attempt_number,
            training_scope_id: request.training_scope_id,
            time_spent_minutes: request.time_spent_minutes,
        })
        .await?;

    let records: Vec<NewAnswerRecord> = request
        .answers
        .into_iter()
        .map(|a| NewAnswerRecord {
            question_id: a.question_id,
            answer_given: a.answer_given,
            is_correct: a.is_correct,
            points_awarded: a.points_awarded,
            time_spent_seconds: a.time_spent_seconds,
            presented_order: a.presented_order,
        })
        .collect();

    let mut answers_persisted = 0;
    for (index, batch) in records.chunks(answer_batch_size.max(1)).enumerate() {
        match repo.create_answer_records(&evaluation_id, batch).await {
            Ok(()) => answers_persisted += batch.len(),
            Err(e) => {
                tracing::warn!(
                    evaluation_id = %evaluation_id,
                    batch = index,
                    size = batch.len(),
                    "answer batch failed, keeping attempt: {e}"
                );
            }
        }
    }

    tracing::info!(
        evaluation_id = %evaluation_id,
        employee_id = %employee_id,
        template_id = %request.template_id,
        attempt = request.attempt_number,
        percentage,
        status = %status,
        "submission recorded"
    );

    Ok(SubmissionOutcome {
        evaluation_id,
        score_obtained,
        score_max: request.score_max,
        percentage,
        status,
        pass_threshold_percent: threshold,
        answers_persisted,
    })
}
