//! The `safetrain pending` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use safetrain_core::eligibility::PendingEvaluation;
use safetrain_core::service::PendingRequest;

use super::{open_service, yes_no};

pub async fn execute(
    employee: String,
    year: Option<i32>,
    scope: Option<String>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, service) = open_service(config_path.as_deref())?;
    let pending = service
        .pending_evaluations(&PendingRequest {
            employee_id: employee.clone(),
            year,
            training_scope_id: scope,
        })
        .await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&pending)?),
        _ if pending.is_empty() => println!("No evaluations pending for {employee}."),
        _ => print_table(&pending),
    }
    Ok(())
}

fn print_table(pending: &[PendingEvaluation]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Template", "Code", "Name", "Attempts", "Approved", "Available",
    ]);

    for p in pending {
        table.add_row(vec![
            Cell::new(&p.template.id),
            Cell::new(&p.template.code),
            Cell::new(&p.template.name),
            Cell::new(format!("{}/{}", p.attempts_used, p.attempts_allowed)),
            Cell::new(yes_no(p.approved)),
            Cell::new(yes_no(p.available)),
        ]);
    }

    println!("{table}");
}
