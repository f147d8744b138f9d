//! The `safetrain quiz` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use safetrain_core::assembler::AssembledTemplate;

use super::open_service;

pub async fn execute(template: String, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let (_, service) = open_service(config_path.as_deref())?;
    let assembled = service.template_with_questions(&template).await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&assembled)?),
        _ => print_table(&assembled),
    }
    Ok(())
}

fn print_table(assembled: &AssembledTemplate) {
    let t = &assembled.template;
    println!(
        "{} ({}) pass {:.0}% / {} attempt(s) / {} points",
        t.name, t.code, t.pass_threshold_percent, t.max_attempts, assembled.total_points
    );

    let mut table = Table::new();
    table.set_header(vec!["#", "Type", "Question", "Options", "Answer", "Points"]);
    for (i, q) in assembled.questions.iter().enumerate() {
        let mut question = q.text.clone();
        if q.required {
            question.push_str(" *");
        }
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&q.question_type),
            Cell::new(question),
            Cell::new(q.options.join("\n")),
            Cell::new(&q.correct_answer),
            Cell::new(q.points),
        ]);
    }
    println!("{table}");
}
