use std::path::PathBuf;

use workflow_cli::build_context;
use workflow_cli::output::{print_json, print_table};
use workflow_core::lifecycle;

/// Read-only: loads the session but never writes it back.
pub fn run(root: PathBuf, json: bool) -> anyhow::Result<()> {
    let ctx = build_context(root)?;
    let tickets = lifecycle::status(&ctx);

    if json {
        return print_json(&tickets);
    }
    if tickets.is_empty() {
        println!("No tickets in progress.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tickets
        .iter()
        .map(|t| {
            vec![
                t.ticket.clone(),
                t.base_branch.clone(),
                t.commits.to_string(),
                t.latest_patch.clone().unwrap_or_else(|| "-".to_string()),
                if t.code_reviews.is_empty() {
                    "-".to_string()
                } else {
                    t.code_reviews.join(", ")
                },
                t.summary.clone(),
            ]
        })
        .collect();
    print_table(
        &["TICKET", "BASE", "COMMITS", "PATCH", "REVIEW", "SUMMARY"],
        &rows,
    );
    Ok(())
}
