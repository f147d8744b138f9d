//! The `safetrain check` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use safetrain_core::service::CompletionRequest;

use super::{open_service, split_list, yes_no};

pub async fn execute(
    employees: String,
    scopes: Option<String>,
    year: Option<i32>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let employee_ids = split_list(&employees);
    anyhow::ensure!(!employee_ids.is_empty(), "--employees must name at least one employee");
    let training_scope_ids = scopes.as_deref().map(split_list).filter(|s| !s.is_empty());

    let (_, service) = open_service(config_path.as_deref())?;
    let report = service
        .check_completion(&CompletionRequest {
            employee_ids,
            training_scope_ids,
            year,
        })
        .await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.has_evaluations {
        println!("No active evaluations this year.");
    }
    let mut table = Table::new();
    table.set_header(vec!["Employee", "Complete"]);
    for (employee, complete) in &report.results {
        table.add_row(vec![Cell::new(employee), Cell::new(yes_no(*complete))]);
    }
    println!("{table}");

    let pending = report.results.values().filter(|c| !**c).count();
    if pending > 0 {
        println!("\n{pending} employee(s) still owe an evaluation.");
    }
    Ok(())
}
