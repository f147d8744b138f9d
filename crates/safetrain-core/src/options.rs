//! Option and answer-key normalization for question-bank items.
//!
//! The bank stores options in three shapes: a list of texts, a list of
//! `{key, text}` pairs, or something that is neither. The shape is resolved
//! once into [`OptionSet`], and the correct answer is rewritten into display
//! text against it. Nothing in this module fails; unknown shapes degrade.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::QuestionType;

/// Display text for a true answer of a true/false question.
pub const TRUE_LABEL: &str = "Verdadero";
/// Display text for a false answer of a true/false question.
pub const FALSE_LABEL: &str = "Falso";

/// A keyed option such as `{"key": "A", "text": "Uno"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedOption {
    pub key: String,
    pub text: String,
}

/// The options of a question after resolving their stored encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum OptionSet {
    /// Option texts, already fit for display.
    Plain(Vec<String>),
    /// Keyed options in stored order.
    Keyed(Vec<KeyedOption>),
    /// The stored value could not be read as a list; it is kept as the only
    /// option.
    Unparseable(String),
}

impl OptionSet {
    /// Resolve a stored options value.
    ///
    /// Strings are parsed as JSON first, since most rows keep the list as
    /// serialized text. A null or blank value is an empty plain list.
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::Null => OptionSet::Plain(Vec::new()),
            Value::String(s) if s.trim().is_empty() => OptionSet::Plain(Vec::new()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => {
                    classify(&items).unwrap_or_else(|| OptionSet::Unparseable(s.clone()))
                }
                _ => OptionSet::Unparseable(s.clone()),
            },
            Value::Array(items) => {
                classify(items).unwrap_or_else(|| OptionSet::Unparseable(raw.to_string()))
            }
            other => OptionSet::Unparseable(other.to_string()),
        }
    }

    /// Texts shown to the person taking the quiz.
    pub fn display_options(&self) -> Vec<String> {
        match self {
            OptionSet::Plain(texts) => texts.clone(),
            OptionSet::Keyed(pairs) => pairs.iter().map(|p| p.text.clone()).collect(),
            OptionSet::Unparseable(original) => vec![original.clone()],
        }
    }

    /// Text of a keyed option. Always `None` for non-keyed sets.
    pub fn text_for_key(&self, key: &str) -> Option<&str> {
        match self {
            OptionSet::Keyed(pairs) => pairs
                .iter()
                .find(|p| p.key == key)
                .map(|p| p.text.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            OptionSet::Plain(texts) => texts.is_empty(),
            OptionSet::Keyed(pairs) => pairs.is_empty(),
            OptionSet::Unparseable(_) => false,
        }
    }
}

/// Classify a JSON list as plain texts or keyed pairs. `None` when the
/// elements are mixed or of an unknown shape.
fn classify(items: &[Value]) -> Option<OptionSet> {
    if items.iter().all(is_scalar) {
        return Some(OptionSet::Plain(items.iter().filter_map(scalar_text).collect()));
    }

    items
        .iter()
        .map(keyed_option)
        .collect::<Option<Vec<_>>>()
        .map(OptionSet::Keyed)
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn keyed_option(value: &Value) -> Option<KeyedOption> {
    let object = value.as_object()?;
    let key = object.get("key").or_else(|| object.get("clave"))?;
    let text = object.get("text").or_else(|| object.get("texto"))?;
    Some(KeyedOption {
        key: scalar_text(key)?,
        text: scalar_text(text)?,
    })
}

/// Rewrite a stored answer key into the display text the client compares
/// against.
///
/// - true/false questions: `"true"` (any case) becomes [`TRUE_LABEL`],
///   everything else [`FALSE_LABEL`];
/// - keyed options: a key, or a JSON list of keys, is mapped to option text,
///   falling back to the key itself when it is not among the options;
/// - plain or unparseable options: the value is already display text.
pub fn normalize_correct_answer(kind: &QuestionType, options: &OptionSet, raw: &str) -> String {
    if kind.is_true_false() {
        return if raw.trim().eq_ignore_ascii_case("true") {
            TRUE_LABEL.to_string()
        } else {
            FALSE_LABEL.to_string()
        };
    }

    if !matches!(options, OptionSet::Keyed(_)) {
        return raw.to_string();
    }

    if raw.trim_start().starts_with('[') {
        let Ok(keys) = serde_json::from_str::<Vec<Value>>(raw) else {
            return raw.to_string();
        };
        let texts: Vec<String> = keys
            .iter()
            .filter_map(scalar_text)
            .map(|key| options.text_for_key(&key).map(str::to_string).unwrap_or(key))
            .collect();
        return serde_json::to_string(&texts).unwrap_or_else(|_| raw.to_string());
    }

    options
        .text_for_key(raw.trim())
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uno_dos() -> OptionSet {
        OptionSet::parse(&json!([
            {"key": "A", "text": "Uno"},
            {"key": "B", "text": "Dos"}
        ]))
    }

    #[test]
    fn parse_plain_list() {
        let set = OptionSet::parse(&json!(["Casco", "Guantes"]));
        assert_eq!(set, OptionSet::Plain(vec!["Casco".into(), "Guantes".into()]));
    }

    #[test]
    fn parse_serialized_keyed_list() {
        let raw = Value::String(r#"[{"key":"A","text":"Uno"},{"key":"B","text":"Dos"}]"#.into());
        let set = OptionSet::parse(&raw);
        assert_eq!(set, uno_dos());
        assert_eq!(set.display_options(), vec!["Uno", "Dos"]);
    }

    #[test]
    fn parse_spanish_keyed_fields() {
        let set = OptionSet::parse(&json!([{"clave": "A", "texto": "Sí"}]));
        assert_eq!(set.text_for_key("A"), Some("Sí"));
    }

    #[test]
    fn parse_garbage_degrades_to_unparseable() {
        let set = OptionSet::parse(&Value::String("Casco; Guantes".into()));
        assert_eq!(set, OptionSet::Unparseable("Casco; Guantes".into()));
        assert_eq!(set.display_options(), vec!["Casco; Guantes"]);

        let mixed = OptionSet::parse(&json!(["A", {"key": "B"}]));
        assert!(matches!(mixed, OptionSet::Unparseable(_)));

        let object = OptionSet::parse(&json!({"A": "Uno"}));
        assert!(matches!(object, OptionSet::Unparseable(_)));
    }

    #[test]
    fn parse_empty_values() {
        assert!(OptionSet::parse(&Value::Null).is_empty());
        assert!(OptionSet::parse(&Value::String("  ".into())).is_empty());
        assert!(OptionSet::parse(&json!([])).is_empty());
    }

    #[test]
    fn keyed_single_answer_maps_to_text() {
        let answer = normalize_correct_answer(&QuestionType::SingleChoice, &uno_dos(), "B");
        assert_eq!(answer, "Dos");
    }

    #[test]
    fn keyed_multi_answer_maps_each_key() {
        let answer =
            normalize_correct_answer(&QuestionType::MultipleChoice, &uno_dos(), r#"["A","B"]"#);
        assert_eq!(answer, r#"["Uno","Dos"]"#);
    }

    #[test]
    fn unknown_keys_fall_back_to_raw_key() {
        assert_eq!(
            normalize_correct_answer(&QuestionType::SingleChoice, &uno_dos(), "Z"),
            "Z"
        );
        assert_eq!(
            normalize_correct_answer(&QuestionType::MultipleChoice, &uno_dos(), r#"["A","Z"]"#),
            r#"["Uno","Z"]"#
        );
    }

    #[test]
    fn malformed_key_list_passes_through() {
        let answer = normalize_correct_answer(&QuestionType::MultipleChoice, &uno_dos(), "[A, B");
        assert_eq!(answer, "[A, B");
    }

    #[test]
    fn true_false_answers() {
        let none = OptionSet::Plain(vec![]);
        let tf = QuestionType::TrueFalse;
        assert_eq!(normalize_correct_answer(&tf, &none, "TRUE"), "Verdadero");
        assert_eq!(normalize_correct_answer(&tf, &none, "true"), "Verdadero");
        assert_eq!(normalize_correct_answer(&tf, &none, "no"), "Falso");
        assert_eq!(normalize_correct_answer(&tf, &none, ""), "Falso");
    }

    #[test]
    fn plain_answers_pass_through() {
        let plain = OptionSet::Plain(vec!["Casco".into(), "Guantes".into()]);
        assert_eq!(
            normalize_correct_answer(&QuestionType::SingleChoice, &plain, "Casco"),
            "Casco"
        );
        let broken = OptionSet::Unparseable("x".into());
        assert_eq!(
            normalize_correct_answer(&QuestionType::SingleChoice, &broken, "B"),
            "B"
        );
    }
}
