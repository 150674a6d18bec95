//! The `studiokit validate` command.

use std::path::PathBuf;

use anyhow::Result;

use studiokit_core::scenario::{load_scenario_path, validate_scenario_set};

pub fn execute(scenarios_path: PathBuf) -> Result<()> {
    let sets = load_scenario_path(&scenarios_path)?;

    let mut total_warnings = 0;

    for set in &sets {
        println!(
            "Scenario set: {} ({} scenarios, {} checks)",
            set.name,
            set.scenarios.len(),
            set.check_count()
        );

        let warnings = validate_scenario_set(set);
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All scenario sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
