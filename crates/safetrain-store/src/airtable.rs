//! Airtable-style HTTP record store.
//!
//! Tables are read with `filterByFormula` and `offset` pagination and written
//! with batched `POST`s. Linked-record fields arrive as arrays of record IDs
//! and cannot be filtered server-side, so rows are narrowed by plain-text ID
//! fields in the formula and by links after the fetch.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::instrument;

use safetrain_core::error::StoreError;
use safetrain_core::model::{
    AppliedEvaluation, EvaluationStatus, EvaluationTemplate, MembershipSummary, NewAnswerRecord,
    NewAppliedEvaluation, QuestionBankItem, QuestionType, RecordStatus, TemplateQuestionLink,
    DEFAULT_PASS_THRESHOLD, POPULATION_ALL,
};
use safetrain_core::traits::{ApprovedScopes, Repository};

pub const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Most record IDs per `RECORD_ID()` lookup formula.
const RECORD_ID_CHUNK: usize = 50;
/// Status labels the evaluations table uses for a passed attempt.
const APPROVED_LABELS: [&str; 3] = ["Approved", "Aprobado", "Aprobada"];

/// Names of the tables the engine uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub templates: String,
    pub question_links: String,
    pub questions: String,
    pub memberships: String,
    pub employees: String,
    pub evaluations: String,
    pub answers: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            templates: "Evaluation Templates".into(),
            question_links: "Template Questions".into(),
            questions: "Question Bank".into(),
            memberships: "Committee Members".into(),
            employees: "Employees".into(),
            evaluations: "Applied Evaluations".into(),
            answers: "Evaluation Answers".into(),
        }
    }
}

mod fields {
    // Templates
    pub const CODE: &str = "Code";
    pub const NAME: &str = "Name";
    pub const TYPE: &str = "Type";
    pub const POPULATION_TARGET: &str = "Population Target";
    pub const STATUS: &str = "Status";
    pub const VALIDITY_YEAR: &str = "Validity Year";
    pub const PASS_THRESHOLD: &str = "Pass Threshold";
    pub const TIME_LIMIT: &str = "Time Limit (min)";
    pub const MAX_ATTEMPTS: &str = "Max Attempts";
    pub const RANDOMIZE: &str = "Randomize Questions";
    pub const SHOW_FEEDBACK: &str = "Show Feedback";

    // Template questions and applied evaluations
    pub const TEMPLATE: &str = "Template";
    /// Lookup of the linked template's record ID, filterable in formulas.
    pub const TEMPLATE_ID: &str = "Template ID";
    pub const QUESTION: &str = "Question";
    pub const ORDER: &str = "Order";
    pub const POINTS: &str = "Points";
    pub const REQUIRED: &str = "Required";

    // Question bank
    pub const TEXT: &str = "Text";
    pub const OPTIONS: &str = "Options";
    pub const CORRECT_ANSWER: &str = "Correct Answer";
    pub const EXPLANATION: &str = "Explanation";

    // Employees and committee members
    pub const EMPLOYEE_ID: &str = "Employee ID";
    pub const COMMITTEE: &str = "Committee";
    pub const EXCLUDED: &str = "Excluded";

    // Applied evaluations
    pub const EMPLOYEE_NAME: &str = "Employee Name";
    pub const DOCUMENT: &str = "Document";
    pub const ROLE: &str = "Role";
    pub const DATE: &str = "Date";
    pub const SCORE_OBTAINED: &str = "Score Obtained";
    pub const SCORE_MAX: &str = "Score Max";
    pub const PERCENTAGE: &str = "Percentage";
    pub const ATTEMPT_NUMBER: &str = "Attempt Number";
    pub const TRAINING_SESSION: &str = "Training Session";
    pub const TIME_SPENT_MIN: &str = "Time Spent (min)";

    // Evaluation answers
    pub const EVALUATION: &str = "Evaluation";
    pub const QUESTION_ID: &str = "Question ID";
    pub const ANSWER_GIVEN: &str = "Answer Given";
    pub const IS_CORRECT: &str = "Is Correct";
    pub const POINTS_AWARDED: &str = "Points Awarded";
    pub const TIME_SPENT_SEC: &str = "Time Spent (s)";
    pub const PRESENTED_ORDER: &str = "Presented Order";
}

/// Record store backed by the Airtable REST API.
pub struct AirtableStore {
    api_key: String,
    base_id: String,
    base_url: String,
    tables: TableNames,
    client: reqwest::Client,
}

impl AirtableStore {
    pub fn new(api_key: &str, base_id: &str, base_url: Option<String>, tables: TableNames) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_key: api_key.to_string(),
            base_id: base_id.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            tables,
            client,
        }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::Network(format!("invalid base URL {}: {e}", self.base_url)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Network(format!("invalid base URL {}", self.base_url)))?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    StoreError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30)
                * 1000;
            return Err(StoreError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            return Err(match status {
                401 | 403 => StoreError::Unauthorized(message),
                404 => StoreError::NotFound(message),
                _ => StoreError::Api { status, message },
            });
        }
        Ok(response)
    }

    /// Every record of a table matching `formula`, following pagination.
    #[instrument(skip(self))]
    async fn list(&self, table: &str, formula: Option<&str>) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut url = self.table_url(table, None)?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(formula) = formula {
                    query.append_pair("filterByFormula", formula);
                }
                if let Some(offset) = &offset {
                    query.append_pair("offset", offset);
                }
            }
            let response = self.send(self.client.get(url)).await?;
            let page: ListResponse = response.json().await.map_err(|e| StoreError::Decode {
                table: table.to_string(),
                message: format!("failed to parse list response: {e}"),
            })?;

            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::debug!(count = records.len(), "records listed");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn get(&self, table: &str, record_id: &str) -> Result<Option<Record>, StoreError> {
        let url = self.table_url(table, Some(record_id))?;
        match self.send(self.client.get(url)).await {
            Ok(response) => {
                let record = response.json().await.map_err(|e| StoreError::Decode {
                    table: table.to_string(),
                    message: format!("failed to parse record: {e}"),
                })?;
                Ok(Some(record))
            }
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn create(&self, table: &str, rows: Vec<Map<String, Value>>) -> Result<Vec<String>, StoreError> {
        let url = self.table_url(table, None)?;
        let body = CreateRequest {
            records: rows.into_iter().map(|fields| CreateRecord { fields }).collect(),
        };
        let response = self.send(self.client.post(url).json(&body)).await?;
        let created: CreateResponse = response.json().await.map_err(|e| StoreError::Decode {
            table: table.to_string(),
            message: format!("failed to parse create response: {e}"),
        })?;
        Ok(created.records.into_iter().map(|r| r.id).collect())
    }

    /// Attempt rows matching `formula`. Rows that cannot be decoded are
    /// skipped so one bad row does not hide the others.
    async fn list_evaluations(&self, formula: &str) -> Result<Vec<AppliedEvaluation>, StoreError> {
        let table = &self.tables.evaluations;
        let evaluations = self
            .list(table, Some(formula))
            .await?
            .iter()
            .filter_map(|record| match decode_evaluation(record, table) {
                Ok(evaluation) => Some(evaluation),
                Err(e) => {
                    tracing::warn!(record_id = %record.id, "skipping attempt row: {e}");
                    None
                }
            })
            .collect();
        Ok(evaluations)
    }
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Serialize)]
struct CreateRequest {
    records: Vec<CreateRecord>,
}

#[derive(Serialize)]
struct CreateRecord {
    fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct CreateResponse {
    records: Vec<Record>,
}

/// Airtable errors come as `{"error": {"message": ..}}` or `{"error": "CODE"}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    match value.get("error") {
        Some(Value::String(code)) => code.clone(),
        Some(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        None => body.to_string(),
    }
}

/// Quote a value for use inside a formula.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn field_equals(field: &str, value: &str) -> String {
    format!("{{{field}}}={}", quote(value))
}

fn any_of<S: AsRef<str>>(field: &str, values: &[S]) -> String {
    let clauses: Vec<String> = values
        .iter()
        .map(|v| field_equals(field, v.as_ref()))
        .collect();
    format!("OR({})", clauses.join(","))
}

fn first(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    }
}

/// Text of a field; lookups (arrays) yield their first element.
fn text(fields: &Map<String, Value>, name: &str) -> String {
    match fields.get(name).map(first) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn opt_text(fields: &Map<String, Value>, name: &str) -> Option<String> {
    Some(text(fields, name)).filter(|s| !s.is_empty())
}

fn number(fields: &Map<String, Value>, name: &str) -> Option<f64> {
    match fields.get(name).map(first) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(fields: &Map<String, Value>, name: &str) -> bool {
    match fields.get(name).map(first) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "sí" | "si"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

/// ID of the first linked record.
fn link(fields: &Map<String, Value>, name: &str) -> Option<String> {
    opt_text(fields, name)
}

fn record_status(label: &str) -> RecordStatus {
    match label.to_lowercase().as_str() {
        "active" | "activo" | "activa" => RecordStatus::Active,
        _ => RecordStatus::Inactive,
    }
}

fn evaluation_status(label: &str) -> EvaluationStatus {
    match label.to_lowercase().as_str() {
        "approved" | "aprobado" | "aprobada" => EvaluationStatus::Approved,
        _ => EvaluationStatus::NotApproved,
    }
}

fn status_label(status: EvaluationStatus) -> &'static str {
    match status {
        EvaluationStatus::Approved => "Approved",
        EvaluationStatus::NotApproved => "Not Approved",
    }
}

fn missing(table: &str, record: &Record, field: &str) -> StoreError {
    StoreError::Decode {
        table: table.to_string(),
        message: format!("record {} has no {field}", record.id),
    }
}

fn decode_template(record: &Record, table: &str) -> Result<EvaluationTemplate, StoreError> {
    let f = &record.fields;
    let validity_year =
        number(f, fields::VALIDITY_YEAR).ok_or_else(|| missing(table, record, fields::VALIDITY_YEAR))?;

    Ok(EvaluationTemplate {
        id: record.id.clone(),
        code: text(f, fields::CODE),
        name: text(f, fields::NAME),
        evaluation_type: text(f, fields::TYPE),
        population_target: opt_text(f, fields::POPULATION_TARGET)
            .unwrap_or_else(|| POPULATION_ALL.to_string()),
        status: record_status(&text(f, fields::STATUS)),
        validity_year: validity_year as i32,
        pass_threshold_percent: number(f, fields::PASS_THRESHOLD).unwrap_or(DEFAULT_PASS_THRESHOLD),
        time_limit_minutes: number(f, fields::TIME_LIMIT).map(|v| v as u32),
        max_attempts: number(f, fields::MAX_ATTEMPTS).map(|v| v as u32).unwrap_or(1),
        randomize_questions: flag(f, fields::RANDOMIZE),
        show_feedback: flag(f, fields::SHOW_FEEDBACK),
    })
}

fn decode_link(record: &Record, table: &str) -> Result<TemplateQuestionLink, StoreError> {
    let f = &record.fields;
    Ok(TemplateQuestionLink {
        id: record.id.clone(),
        template_id: link(f, fields::TEMPLATE).ok_or_else(|| missing(table, record, fields::TEMPLATE))?,
        question_id: link(f, fields::QUESTION).ok_or_else(|| missing(table, record, fields::QUESTION))?,
        order: number(f, fields::ORDER).map(|v| v as i64).unwrap_or(0),
        point_value: number(f, fields::POINTS).unwrap_or(1.0),
        required: flag(f, fields::REQUIRED),
    })
}

fn decode_question(record: &Record) -> QuestionBankItem {
    let f = &record.fields;
    QuestionBankItem {
        id: record.id.clone(),
        text: text(f, fields::TEXT),
        question_type: QuestionType::from(text(f, fields::TYPE)),
        options_raw: f.get(fields::OPTIONS).cloned().unwrap_or(Value::Null),
        correct_answer_raw: text(f, fields::CORRECT_ANSWER),
        explanation: opt_text(f, fields::EXPLANATION),
    }
}

fn decode_evaluation(record: &Record, table: &str) -> Result<AppliedEvaluation, StoreError> {
    let f = &record.fields;
    let raw_date = text(f, fields::DATE);
    let date = NaiveDate::parse_from_str(raw_date.get(..10).unwrap_or(raw_date.as_str()), "%Y-%m-%d")
        .map_err(|e| StoreError::Decode {
            table: table.to_string(),
            message: format!("record {} has invalid {}: {e}", record.id, fields::DATE),
        })?;

    Ok(AppliedEvaluation {
        id: record.id.clone(),
        template_id: link(f, fields::TEMPLATE).ok_or_else(|| missing(table, record, fields::TEMPLATE))?,
        employee_id: opt_text(f, fields::EMPLOYEE_ID)
            .ok_or_else(|| missing(table, record, fields::EMPLOYEE_ID))?,
        employee_name: text(f, fields::EMPLOYEE_NAME),
        document_id: text(f, fields::DOCUMENT),
        role_label: text(f, fields::ROLE),
        date,
        score_obtained: number(f, fields::SCORE_OBTAINED).unwrap_or(0.0),
        score_max: number(f, fields::SCORE_MAX).unwrap_or(0.0),
        percentage: number(f, fields::PERCENTAGE).unwrap_or(0.0),
        status: evaluation_status(&text(f, fields::STATUS)),
        attempt_number: number(f, fields::ATTEMPT_NUMBER).map(|v| v as u32).unwrap_or(0),
        training_scope_id: link(f, fields::TRAINING_SESSION),
        time_spent_minutes: number(f, fields::TIME_SPENT_MIN),
    })
}

fn encode_evaluation(evaluation: NewAppliedEvaluation) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert(fields::TEMPLATE.into(), Value::from(vec![evaluation.template_id]));
    row.insert(fields::EMPLOYEE_ID.into(), Value::from(evaluation.employee.id));
    row.insert(fields::EMPLOYEE_NAME.into(), Value::from(evaluation.employee.name));
    row.insert(fields::DOCUMENT.into(), Value::from(evaluation.employee.document_id));
    row.insert(fields::ROLE.into(), Value::from(evaluation.employee.role_label));
    row.insert(fields::DATE.into(), Value::from(evaluation.date.format("%Y-%m-%d").to_string()));
    row.insert(fields::SCORE_OBTAINED.into(), Value::from(evaluation.score_obtained));
    row.insert(fields::SCORE_MAX.into(), Value::from(evaluation.score_max));
    row.insert(fields::PERCENTAGE.into(), Value::from(evaluation.percentage));
    row.insert(fields::STATUS.into(), Value::from(status_label(evaluation.status)));
    row.insert(fields::ATTEMPT_NUMBER.into(), Value::from(evaluation.attempt_number));
    if let Some(scope) = evaluation.training_scope_id {
        row.insert(fields::TRAINING_SESSION.into(), Value::from(vec![scope]));
    }
    if let Some(minutes) = evaluation.time_spent_minutes {
        row.insert(fields::TIME_SPENT_MIN.into(), Value::from(minutes));
    }
    row
}

fn encode_answer(evaluation_id: &str, answer: &NewAnswerRecord) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert(fields::EVALUATION.into(), Value::from(vec![evaluation_id.to_string()]));
    row.insert(fields::QUESTION_ID.into(), Value::from(answer.question_id.clone()));
    row.insert(fields::ANSWER_GIVEN.into(), Value::from(answer.answer_given.clone()));
    row.insert(fields::IS_CORRECT.into(), Value::from(answer.is_correct));
    row.insert(fields::POINTS_AWARDED.into(), Value::from(answer.points_awarded));
    if let Some(seconds) = answer.time_spent_seconds {
        row.insert(fields::TIME_SPENT_SEC.into(), Value::from(seconds));
    }
    if let Some(order) = answer.presented_order {
        row.insert(fields::PRESENTED_ORDER.into(), Value::from(order));
    }
    row
}

#[async_trait]
impl Repository for AirtableStore {
    fn name(&self) -> &str {
        "airtable"
    }

    async fn list_active_templates(
        &self,
        year: i32,
    ) -> Result<Vec<EvaluationTemplate>, StoreError> {
        let table = &self.tables.templates;
        let formula = format!("{{{}}}={year}", fields::VALIDITY_YEAR);
        let mut templates = Vec::new();
        for record in self.list(table, Some(&formula)).await? {
            let template = decode_template(&record, table)?;
            if template.status == RecordStatus::Active && template.validity_year == year {
                templates.push(template);
            }
        }
        Ok(templates)
    }

    async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<EvaluationTemplate>, StoreError> {
        let table = &self.tables.templates;
        self.get(table, template_id)
            .await?
            .map(|record| decode_template(&record, table))
            .transpose()
    }

    async fn committee_memberships(
        &self,
        employee_id: &str,
    ) -> Result<MembershipSummary, StoreError> {
        let members = self
            .list(
                &self.tables.memberships,
                Some(&field_equals(fields::EMPLOYEE_ID, employee_id)),
            )
            .await?;
        let committees = members
            .iter()
            .filter(|r| record_status(&text(&r.fields, fields::STATUS)) == RecordStatus::Active)
            .filter_map(|r| opt_text(&r.fields, fields::COMMITTEE))
            .collect();

        let excluded_formula = format!(
            "AND({},{{{}}})",
            field_equals(fields::EMPLOYEE_ID, employee_id),
            fields::EXCLUDED
        );
        let excluded = !self
            .list(&self.tables.employees, Some(&excluded_formula))
            .await?
            .is_empty();

        Ok(MembershipSummary {
            committees,
            excluded,
        })
    }

    async fn list_excluded_employees(&self) -> Result<HashSet<String>, StoreError> {
        let formula = format!("{{{}}}", fields::EXCLUDED);
        Ok(self
            .list(&self.tables.employees, Some(&formula))
            .await?
            .iter()
            .filter_map(|r| opt_text(&r.fields, fields::EMPLOYEE_ID))
            .collect())
    }

    async fn list_attempts(
        &self,
        employee_id: &str,
        template_id: &str,
        scope_id: Option<&str>,
    ) -> Result<Vec<AppliedEvaluation>, StoreError> {
        let formula = format!(
            "AND({},{})",
            field_equals(fields::EMPLOYEE_ID, employee_id),
            field_equals(fields::TEMPLATE_ID, template_id)
        );
        Ok(self
            .list_evaluations(&formula)
            .await?
            .into_iter()
            .filter(|e| e.employee_id == employee_id && e.template_id == template_id)
            .filter(|e| scope_id.is_none() || e.training_scope_id.as_deref() == scope_id)
            .collect())
    }

    async fn list_approved_attempts(
        &self,
        employee_ids: &[String],
        scope_ids: Option<&[String]>,
    ) -> Result<ApprovedScopes, StoreError> {
        let mut approved = ApprovedScopes::new();
        if employee_ids.is_empty() {
            return Ok(approved);
        }

        let formula = format!(
            "AND({},{})",
            any_of(fields::EMPLOYEE_ID, employee_ids),
            any_of(fields::STATUS, &APPROVED_LABELS)
        );
        for evaluation in self.list_evaluations(&formula).await? {
            if !evaluation.status.is_approved() {
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
                .entry(evaluation.employee_id)
                .or_default()
                .insert(evaluation.training_scope_id);
        }
        Ok(approved)
    }

    async fn list_template_question_links(
        &self,
        template_id: &str,
    ) -> Result<Vec<TemplateQuestionLink>, StoreError> {
        let table = &self.tables.question_links;
        let formula = field_equals(fields::TEMPLATE_ID, template_id);
        let mut links = Vec::new();
        for record in self.list(table, Some(&formula)).await? {
            let link = decode_link(&record, table)?;
            if link.template_id == template_id {
                links.push(link);
            }
        }
        Ok(links)
    }

    async fn get_question_bank_items(
        &self,
        ids: &[String],
    ) -> Result<Vec<QuestionBankItem>, StoreError> {
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(RECORD_ID_CHUNK) {
            let clauses: Vec<String> = chunk
                .iter()
                .map(|id| format!("RECORD_ID()={}", quote(id)))
                .collect();
            let formula = format!("OR({})", clauses.join(","));
            items.extend(
                self.list(&self.tables.questions, Some(&formula))
                    .await?
                    .iter()
                    .map(decode_question),
            );
        }
        Ok(items)
    }

    async fn create_applied_evaluation(
        &self,
        evaluation: NewAppliedEvaluation,
    ) -> Result<String, StoreError> {
        let table = &self.tables.evaluations;
        self.create(table, vec![encode_evaluation(evaluation)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode {
                table: table.to_string(),
                message: "create returned no record".into(),
            })
    }

    async fn create_answer_records(
        &self,
        evaluation_id: &str,
        records: &[NewAnswerRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows = records
            .iter()
            .map(|answer| encode_answer(evaluation_id, answer))
            .collect();
        self.create(&self.tables.answers, rows).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetrain_core::model::Employee;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tables() -> TableNames {
        TableNames {
            templates: "Templates".into(),
            question_links: "Links".into(),
            questions: "Questions".into(),
            memberships: "Members".into(),
            employees: "Employees".into(),
            evaluations: "Evaluations".into(),
            answers: "Answers".into(),
        }
    }

    fn store(server: &MockServer) -> AirtableStore {
        AirtableStore::new("test-key", "appTEST", Some(server.uri()), tables())
    }

    fn template_record(id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "fields": {
                "Code": "IND-01",
                "Name": "Inducción SST",
                "Population Target": "All",
                "Status": status,
                "Validity Year": 2026,
                "Pass Threshold": 70,
                "Max Attempts": 2,
                "Randomize Questions": true
            }
        })
    }

    fn evaluation_record(id: &str, employee: &str, status: &str, scope: Option<&str>) -> Value {
        let mut fields = json!({
            "Template": ["tpl1"],
            "Employee ID": employee,
            "Date": "2026-03-04",
            "Score Obtained": 8,
            "Score Max": 10,
            "Percentage": 80,
            "Status": status,
            "Attempt Number": 1
        });
        if let Some(scope) = scope {
            fields["Training Session"] = json!([scope]);
        }
        json!({"id": id, "fields": fields})
    }

    #[tokio::test]
    async fn active_templates_are_decoded_and_filtered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Templates"))
            .and(header("Authorization", "Bearer test-key"))
            .and(query_param("filterByFormula", "{Validity Year}=2026"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [template_record("tpl1", "Activo"), template_record("tpl2", "Inactive")]
            })))
            .mount(&server)
            .await;

        let templates = store(&server).list_active_templates(2026).await.unwrap();
        assert_eq!(templates.len(), 1);
        let t = &templates[0];
        assert_eq!(t.id, "tpl1");
        assert_eq!(t.pass_threshold_percent, 70.0);
        assert_eq!(t.max_attempts, 2);
        assert!(t.randomize_questions);
        assert!(!t.show_feedback);
    }

    #[tokio::test]
    async fn pagination_follows_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Employees"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": "r1", "fields": {"Employee ID": "emp-1", "Excluded": true}}],
                "offset": "itr1"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Employees"))
            .and(query_param("offset", "itr1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": "r2", "fields": {"Employee ID": "emp-2", "Excluded": true}}]
            })))
            .mount(&server)
            .await;

        let excluded = store(&server).list_excluded_employees().await.unwrap();
        assert_eq!(excluded.len(), 2);
        assert!(excluded.contains("emp-1"));
        assert!(excluded.contains("emp-2"));
    }

    #[tokio::test]
    async fn missing_template_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Templates/recMissing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "NOT_FOUND"})),
            )
            .mount(&server)
            .await;

        let template = store(&server).get_template("recMissing").await.unwrap();
        assert!(template.is_none());
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"type": "AUTHENTICATION_REQUIRED", "message": "Authentication required"}
            })))
            .mount(&server)
            .await;

        let err = store(&server).list_active_templates(2026).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(ref m) if m == "Authentication required"));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn rate_limiting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&server)
            .await;

        let err = store(&server).list_excluded_employees().await.unwrap_err();
        assert!(matches!(err, StoreError::RateLimited { retry_after_ms: 5000 }));
    }

    #[tokio::test]
    async fn approved_attempts_are_grouped_by_scope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Evaluations"))
            .and(query_param(
                "filterByFormula",
                "AND(OR({Employee ID}='emp-1',{Employee ID}='emp-2'),\
                 OR({Status}='Approved',{Status}='Aprobado',{Status}='Aprobada'))",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    evaluation_record("e1", "emp-1", "Approved", Some("ses1")),
                    evaluation_record("e2", "emp-1", "Aprobado", None),
                    evaluation_record("e3", "emp-2", "Not Approved", Some("ses1"))
                ]
            })))
            .mount(&server)
            .await;

        let ids = vec!["emp-1".to_string(), "emp-2".to_string()];
        let approved = store(&server)
            .list_approved_attempts(&ids, None)
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert!(approved["emp-1"].contains(&Some("ses1".to_string())));
        assert!(approved["emp-1"].contains(&None));
    }

    #[tokio::test]
    async fn attempts_are_narrowed_by_template_and_scope() {
        let server = MockServer::start().await;
        let mut other_template = evaluation_record("e3", "emp-1", "Approved", None);
        other_template["fields"]["Template"] = json!(["tpl9"]);
        Mock::given(method("GET"))
            .and(path("/appTEST/Evaluations"))
            .and(query_param(
                "filterByFormula",
                "AND({Employee ID}='emp-1',{Template ID}='tpl1')",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    evaluation_record("e1", "emp-1", "Not Approved", Some("ses1")),
                    evaluation_record("e2", "emp-1", "Approved", Some("ses2")),
                    other_template
                ]
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        let scoped = store.list_attempts("emp-1", "tpl1", Some("ses1")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "e1");

        let all = store.list_attempts("emp-1", "tpl1", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn malformed_attempt_rows_do_not_hide_others() {
        let server = MockServer::start().await;
        let mut dateless = evaluation_record("e2", "emp-2", "Approved", None);
        dateless["fields"]
            .as_object_mut()
            .unwrap()
            .remove("Date");
        let mut unlinked = evaluation_record("e3", "emp-2", "Approved", None);
        unlinked["fields"]
            .as_object_mut()
            .unwrap()
            .remove("Template");
        Mock::given(method("GET"))
            .and(path("/appTEST/Evaluations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    evaluation_record("e1", "emp-1", "Approved", Some("ses1")),
                    dateless,
                    unlinked
                ]
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        let ids = vec!["emp-1".to_string(), "emp-2".to_string()];
        let approved = store.list_approved_attempts(&ids, None).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert!(approved["emp-1"].contains(&Some("ses1".to_string())));

        let attempts = store.list_attempts("emp-2", "tpl1", None).await.unwrap();
        assert!(attempts.is_empty());
    }

    #[tokio::test]
    async fn create_evaluation_posts_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/appTEST/Evaluations"))
            .and(body_partial_json(json!({
                "records": [{"fields": {
                    "Template": ["tpl1"],
                    "Employee ID": "emp-1",
                    "Status": "Approved",
                    "Training Session": ["ses1"],
                    "Date": "2026-06-01"
                }}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": "recNew", "fields": {}}]
            })))
            .mount(&server)
            .await;

        let id = store(&server)
            .create_applied_evaluation(NewAppliedEvaluation {
                template_id: "tpl1".into(),
                employee: Employee {
                    id: "emp-1".into(),
                    name: "Ana".into(),
                    document_id: "1020".into(),
                    role_label: "Operaria".into(),
                },
                date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                score_obtained: 8.0,
                score_max: 10.0,
                percentage: 80.0,
                status: EvaluationStatus::Approved,
                attempt_number: 1,
                training_scope_id: Some("ses1".into()),
                time_spent_minutes: None,
            })
            .await
            .unwrap();
        assert_eq!(id, "recNew");
    }

    #[tokio::test]
    async fn question_items_keep_raw_encodings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appTEST/Questions"))
            .and(query_param(
                "filterByFormula",
                "OR(RECORD_ID()='q1',RECORD_ID()='q2')",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    {"id": "q1", "fields": {
                        "Text": "¿Qué EPP es obligatorio?",
                        "Type": "Selección Única",
                        "Options": "[{\"key\":\"A\",\"text\":\"Casco\"}]",
                        "Correct Answer": "A"
                    }},
                    {"id": "q2", "fields": {"Text": "El casco es opcional", "Type": "Verdadero/Falso"}}
                ]
            })))
            .mount(&server)
            .await;

        let ids = vec!["q1".to_string(), "q2".to_string()];
        let items = store(&server).get_question_bank_items(&ids).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question_type, QuestionType::SingleChoice);
        assert!(items[0].options_raw.is_string());
        assert_eq!(items[1].question_type, QuestionType::TrueFalse);
        assert!(items[1].options_raw.is_null());
    }

    #[test]
    fn formula_values_are_escaped() {
        assert_eq!(quote("O'Brien"), r"'O\'Brien'");
        assert_eq!(field_equals("Employee ID", "a"), "{Employee ID}='a'");
    }

    #[test]
    fn error_bodies() {
        assert_eq!(error_message(r#"{"error":"NOT_FOUND"}"#), "NOT_FOUND");
        assert_eq!(
            error_message(r#"{"error":{"type":"X","message":"bad formula"}}"#),
            "bad formula"
        );
        assert_eq!(error_message("plain"), "plain");
    }
}
