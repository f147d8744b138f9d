//! Quiz assembly: a template expanded into normalized, ordered questions.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::completion::unique_ids;
use crate::error::{EngineError, EngineResult};
use crate::model::{EvaluationTemplate, QuestionBankItem, QuestionType, TemplateQuestionLink};
use crate::options::{normalize_correct_answer, OptionSet, FALSE_LABEL, TRUE_LABEL};
use crate::traits::Repository;

/// A question ready to be presented and graded by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledQuestion {
    /// ID of the template link.
    pub id: String,
    /// ID of the question-bank item.
    pub source_id: String,
    pub order: i64,
    pub points: f64,
    pub required: bool,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    /// Display text of the correct answer; a JSON list of texts for
    /// multi-select keyed questions.
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// A template with its questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledTemplate {
    pub template: EvaluationTemplate,
    pub questions: Vec<AssembledQuestion>,
    /// Sum of the question points; the `scoreMax` of a full submission.
    pub total_points: f64,
}

/// Normalize one linked bank item.
pub fn assemble_question(link: &TemplateQuestionLink, item: &QuestionBankItem) -> AssembledQuestion {
    let option_set = OptionSet::parse(&item.options_raw);
    let correct_answer =
        normalize_correct_answer(&item.question_type, &option_set, &item.correct_answer_raw);

    let options = if item.question_type.is_true_false() && option_set.is_empty() {
        vec![TRUE_LABEL.to_string(), FALSE_LABEL.to_string()]
    } else {
        option_set.display_options()
    };

    AssembledQuestion {
        id: link.id.clone(),
        source_id: item.id.clone(),
        order: link.order,
        points: link.point_value,
        required: link.required,
        text: item.text.clone(),
        question_type: item.question_type.clone(),
        options,
        correct_answer,
        explanation: item.explanation.clone(),
    }
}

/// Join links with their bank items in link order.
///
/// Links are sorted by `order`; equal orders keep the order the store
/// returned them in. Links pointing at a missing bank item are skipped.
pub fn assemble_questions(
    mut links: Vec<TemplateQuestionLink>,
    items: &[QuestionBankItem],
) -> Vec<AssembledQuestion> {
    links.sort_by_key(|link| link.order);
    let by_id: HashMap<&str, &QuestionBankItem> =
        items.iter().map(|item| (item.id.as_str(), item)).collect();

    links
        .iter()
        .filter_map(|link| match by_id.get(link.question_id.as_str()) {
            Some(item) => Some(assemble_question(link, item)),
            None => {
                tracing::warn!(
                    link_id = %link.id,
                    question_id = %link.question_id,
                    "question link points at a missing bank item, skipping"
                );
                None
            }
        })
        .collect()
}

/// Shuffle questions with the given source of randomness.
pub fn shuffle_questions_with<R: Rng + ?Sized>(questions: &mut [AssembledQuestion], rng: &mut R) {
    questions.shuffle(rng);
}

fn shuffle_questions(questions: &mut [AssembledQuestion]) {
    shuffle_questions_with(questions, &mut rand::thread_rng());
}

/// Load a template and expand it into its questions.
///
/// When the template randomizes questions, every call returns a fresh
/// permutation; the result must not be cached as the template's order.
pub async fn assemble_template(
    repo: &dyn Repository,
    template_id: &str,
) -> EngineResult<AssembledTemplate> {
    let template = repo
        .get_template(template_id)
        .await?
        .ok_or_else(|| EngineError::TemplateNotFound(template_id.to_string()))?;

    let links = repo.list_template_question_links(template_id).await?;
    let question_ids = unique_ids(links.iter().map(|link| &link.question_id));
    let items = if question_ids.is_empty() {
        Vec::new()
    } else {
        repo.get_question_bank_items(&question_ids).await?
    };

    let mut questions = assemble_questions(links, &items);
    if template.randomize_questions {
        shuffle_questions(&mut questions);
    }
    let total_points = questions.iter().map(|q| q.points).sum();

    tracing::info!(
        template_id,
        questions = questions.len(),
        randomized = template.randomize_questions,
        "template assembled"
    );

    Ok(AssembledTemplate {
        template,
        questions,
        total_points,
    })
}
