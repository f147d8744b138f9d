//! The `safetrain validate` command.

use std::path::PathBuf;

use anyhow::Result;

use safetrain_core::memory::StoreSnapshot;

pub fn execute(fixture: PathBuf) -> Result<()> {
    let snapshot = StoreSnapshot::load_json(&fixture)?;
    println!(
        "Fixture: {} template(s), {} question(s), {} link(s), {} evaluation(s)",
        snapshot.templates.len(),
        snapshot.questions.len(),
        snapshot.question_links.len(),
        snapshot.evaluations.len(),
    );

    let warnings = snapshot.validate();
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.record_id, w.message);
    }

    if warnings.is_empty() {
        println!("Fixture valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
