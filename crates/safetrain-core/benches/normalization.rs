use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use safetrain_core::model::QuestionType;
use safetrain_core::options::{normalize_correct_answer, OptionSet};

fn bench_parse_options(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_options");

    let plain = json!(["Casco", "Guantes", "Botas", "Gafas"]);
    let keyed = Value::String(
        r#"[{"key":"A","text":"Casco"},{"key":"B","text":"Guantes"},{"key":"C","text":"Botas"},{"key":"D","text":"Gafas"}]"#
            .to_string(),
    );
    let garbage = Value::String("Casco; Guantes; Botas; Gafas".to_string());

    let large = {
        let items: Vec<Value> = (0..100)
            .map(|i| json!({"key": format!("K{i}"), "text": format!("Option {i}")}))
            .collect();
        Value::String(Value::Array(items).to_string())
    };

    group.bench_function("plain", |b| b.iter(|| OptionSet::parse(black_box(&plain))));
    group.bench_function("keyed_string", |b| {
        b.iter(|| OptionSet::parse(black_box(&keyed)))
    });
    group.bench_function("unparseable", |b| {
        b.iter(|| OptionSet::parse(black_box(&garbage)))
    });
    group.bench_function("keyed_large", |b| {
        b.iter(|| OptionSet::parse(black_box(&large)))
    });

    group.finish();
}

fn bench_normalize_answer(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_answer");

    let options = OptionSet::parse(&json!([
        {"key": "A", "text": "Casco"},
        {"key": "B", "text": "Guantes"},
        {"key": "C", "text": "Botas"}
    ]));

    group.bench_function("keyed_single", |b| {
        b.iter(|| {
            normalize_correct_answer(
                black_box(&QuestionType::SingleChoice),
                black_box(&options),
                black_box("B"),
            )
        })
    });

    group.bench_function("keyed_multi", |b| {
        b.iter(|| {
            normalize_correct_answer(
                black_box(&QuestionType::MultipleChoice),
                black_box(&options),
                black_box(r#"["A","C"]"#),
            )
        })
    });

    group.bench_function("true_false", |b| {
        b.iter(|| {
            normalize_correct_answer(
                black_box(&QuestionType::TrueFalse),
                black_box(&options),
                black_box("TRUE"),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse_options, bench_normalize_answer);
criterion_main!(benches);
