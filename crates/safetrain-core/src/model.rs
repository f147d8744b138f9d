//! Core data model types for safetrain.
//!
//! These mirror the rows of the external record store: evaluation templates,
//! the question bank and its template links, committee memberships, and the
//! append-only attempt and answer logs.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pass threshold applied when a template does not declare one, or when the
/// template cannot be read while scoring.
pub const DEFAULT_PASS_THRESHOLD: f64 = 60.0;

/// Population target that makes a template apply to every employee.
pub const POPULATION_ALL: &str = "All";

/// Active/inactive flag shared by templates and committee memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(alias = "Activo", alias = "active")]
    Active,
    #[serde(alias = "Inactivo", alias = "inactive")]
    Inactive,
}

/// Outcome of a graded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationStatus {
    #[serde(alias = "Aprobado", alias = "approved")]
    Approved,
    #[serde(alias = "No Aprobado", alias = "not_approved")]
    NotApproved,
}

impl EvaluationStatus {
    /// Grade a percentage against a threshold. Reaching the threshold passes.
    pub fn from_percentage(percentage: f64, threshold: f64) -> Self {
        if percentage >= threshold {
            EvaluationStatus::Approved
        } else {
            EvaluationStatus::NotApproved
        }
    }

    pub fn is_approved(self) -> bool {
        self == EvaluationStatus::Approved
    }
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationStatus::Approved => write!(f, "Approved"),
            EvaluationStatus::NotApproved => write!(f, "NotApproved"),
        }
    }
}

/// Identity of the employee taking an evaluation. Owned by the HR records,
/// copied onto each attempt row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub role_label: String,
}

/// A named evaluation definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationTemplate {
    pub id: String,
    #[serde(default)]
    pub code: String,
    pub name: String,
    /// Free-text evaluation type (induction, refresher, ...).
    #[serde(default, rename = "type")]
    pub evaluation_type: String,
    /// `"All"` or free text naming one or more committees.
    #[serde(default = "default_population")]
    pub population_target: String,
    pub status: RecordStatus,
    pub validity_year: i32,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold_percent: f64,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub show_feedback: bool,
}

impl EvaluationTemplate {
    /// Whether an employee with the given active committees is part of this
    /// template's audience.
    ///
    /// The target is free text that may name several committees, so a
    /// committee matches when its name appears anywhere inside the target.
    pub fn targets(&self, committees: &BTreeSet<String>) -> bool {
        let target = self.population_target.trim();
        if target == POPULATION_ALL {
            return true;
        }
        committees
            .iter()
            .any(|name| !name.is_empty() && target.contains(name.as_str()))
    }
}

fn default_population() -> String {
    POPULATION_ALL.to_string()
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

fn default_max_attempts() -> u32 {
    1
}

/// One row linking an employee to a committee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeMembership {
    pub employee_id: String,
    pub committee_name: String,
    pub status: RecordStatus,
}

/// An employee's active committees plus the exclusion flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSummary {
    pub committees: BTreeSet<String>,
    pub excluded: bool,
}

/// Places one question-bank item inside a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuestionLink {
    pub id: String,
    pub template_id: String,
    pub question_id: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_point_value")]
    pub point_value: f64,
    #[serde(default)]
    pub required: bool,
}

fn default_point_value() -> f64 {
    1.0
}

/// Kind of question in the bank.
///
/// The store holds free-text labels in either English or Spanish; labels
/// that are not recognised are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Other(String),
}

impl QuestionType {
    pub fn is_true_false(&self) -> bool {
        matches!(self, QuestionType::TrueFalse)
    }
}

impl From<&str> for QuestionType {
    fn from(label: &str) -> Self {
        let folded: String = label
            .chars()
            .map(|c| match c {
                'á' | 'Á' => 'a',
                'é' | 'É' => 'e',
                'í' | 'Í' => 'i',
                'ó' | 'Ó' => 'o',
                'ú' | 'Ú' => 'u',
                other => other.to_ascii_lowercase(),
            })
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match folded.as_str() {
            "singlechoice" | "single" | "seleccionunica" | "unicarespuesta" | "opcionunica" => {
                QuestionType::SingleChoice
            }
            "multiplechoice" | "multiple" | "seleccionmultiple" | "multiplerespuesta"
            | "opcionmultiple" => QuestionType::MultipleChoice,
            "truefalse" | "boolean" | "verdaderofalso" | "vf" => QuestionType::TrueFalse,
            _ => QuestionType::Other(label.trim().to_string()),
        }
    }
}

impl From<String> for QuestionType {
    fn from(label: String) -> Self {
        QuestionType::from(label.as_str())
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::SingleChoice => write!(f, "SingleChoice"),
            QuestionType::MultipleChoice => write!(f, "MultipleChoice"),
            QuestionType::TrueFalse => write!(f, "TrueFalse"),
            QuestionType::Other(label) => write!(f, "{label}"),
        }
    }
}

/// A question as stored in the bank, with its options and answer key in
/// whatever encoding the authoring tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBankItem {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// A JSON list of texts, a JSON list of `{key, text}` objects, a string
    /// holding either of those, or anything else.
    #[serde(default)]
    pub options_raw: serde_json::Value,
    #[serde(default)]
    pub correct_answer_raw: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// One graded attempt of a template by an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedEvaluation {
    pub id: String,
    pub template_id: String,
    pub employee_id: String,
    #[serde(default)]
    pub employee_name: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub role_label: String,
    pub date: NaiveDate,
    pub score_obtained: f64,
    pub score_max: f64,
    pub percentage: f64,
    pub status: EvaluationStatus,
    pub attempt_number: u32,
    #[serde(default)]
    pub training_scope_id: Option<String>,
    #[serde(default)]
    pub time_spent_minutes: Option<f64>,
}

/// Fields of an attempt row before the store assigns its ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppliedEvaluation {
    pub template_id: String,
    pub employee: Employee,
    pub date: NaiveDate,
    pub score_obtained: f64,
    pub score_max: f64,
    pub percentage: f64,
    pub status: EvaluationStatus,
    pub attempt_number: u32,
    pub training_scope_id: Option<String>,
    pub time_spent_minutes: Option<f64>,
}

impl NewAppliedEvaluation {
    pub fn into_record(self, id: String) -> AppliedEvaluation {
        AppliedEvaluation {
            id,
            template_id: self.template_id,
            employee_id: self.employee.id,
            employee_name: self.employee.name,
            document_id: self.employee.document_id,
            role_label: self.employee.role_label,
            date: self.date,
            score_obtained: self.score_obtained,
            score_max: self.score_max,
            percentage: self.percentage,
            status: self.status,
            attempt_number: self.attempt_number,
            training_scope_id: self.training_scope_id,
            time_spent_minutes: self.time_spent_minutes,
        }
    }
}

/// One answered question within an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub id: String,
    pub evaluation_id: String,
    pub question_id: String,
    pub answer_given: String,
    pub is_correct: bool,
    pub points_awarded: f64,
    #[serde(default)]
    pub time_spent_seconds: Option<u32>,
    #[serde(default)]
    pub presented_order: Option<u32>,
}

/// Fields of an answer row before it is attached to an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnswerRecord {
    pub question_id: String,
    pub answer_given: String,
    pub is_correct: bool,
    pub points_awarded: f64,
    pub time_spent_seconds: Option<u32>,
    pub presented_order: Option<u32>,
}

impl NewAnswerRecord {
    pub fn into_record(self, id: String, evaluation_id: &str) -> AnswerRecord {
        AnswerRecord {
            id,
            evaluation_id: evaluation_id.to_string(),
            question_id: self.question_id,
            answer_given: self.answer_given,
            is_correct: self.is_correct,
            points_awarded: self.points_awarded,
            time_spent_seconds: self.time_spent_seconds,
            presented_order: self.presented_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(target: &str) -> EvaluationTemplate {
        serde_json::from_value(serde_json::json!({
            "id": "tpl-1",
            "name": "Induction",
            "populationTarget": target,
            "status": "Active",
            "validityYear": 2026
        }))
        .unwrap()
    }

    #[test]
    fn template_defaults() {
        let tpl = template("All");
        assert_eq!(tpl.pass_threshold_percent, DEFAULT_PASS_THRESHOLD);
        assert_eq!(tpl.max_attempts, 1);
        assert!(!tpl.randomize_questions);
        assert!(tpl.time_limit_minutes.is_none());
    }

    #[test]
    fn population_all_targets_everyone() {
        assert!(template("All").targets(&BTreeSet::new()));
    }

    #[test]
    fn population_matches_by_containment() {
        let tpl = template("COPASST, Brigada de Emergencias");
        let copasst: BTreeSet<String> = ["COPASST".to_string()].into();
        let brigada: BTreeSet<String> = ["Brigada".to_string()].into();
        let cocolab: BTreeSet<String> = ["COCOLAB".to_string()].into();
        assert!(tpl.targets(&copasst));
        assert!(tpl.targets(&brigada));
        assert!(!tpl.targets(&cocolab));
        assert!(!tpl.targets(&BTreeSet::new()));
    }

    #[test]
    fn question_type_labels() {
        assert_eq!(QuestionType::from("TrueFalse"), QuestionType::TrueFalse);
        assert_eq!(
            QuestionType::from("Verdadero/Falso"),
            QuestionType::TrueFalse
        );
        assert_eq!(
            QuestionType::from("Selección Única"),
            QuestionType::SingleChoice
        );
        assert_eq!(
            QuestionType::from("multiple_choice"),
            QuestionType::MultipleChoice
        );
        assert_eq!(
            QuestionType::from("Abierta"),
            QuestionType::Other("Abierta".into())
        );
        assert_eq!(QuestionType::Other("Abierta".into()).to_string(), "Abierta");
    }

    #[test]
    fn status_accepts_spanish_labels() {
        let status: EvaluationStatus = serde_json::from_str("\"Aprobado\"").unwrap();
        assert_eq!(status, EvaluationStatus::Approved);
        let status: RecordStatus = serde_json::from_str("\"Inactivo\"").unwrap();
        assert_eq!(status, RecordStatus::Inactive);
    }

    #[test]
    fn status_from_percentage_is_inclusive() {
        assert!(EvaluationStatus::from_percentage(60.0, 60.0).is_approved());
        assert!(!EvaluationStatus::from_percentage(59.99, 60.0).is_approved());
    }
}
