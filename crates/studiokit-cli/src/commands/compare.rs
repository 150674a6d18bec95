//! The `studiokit compare` command.

use std::path::PathBuf;

use anyhow::Result;

use studiokit_core::report::RunReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    let baseline = RunReport::load_json(&baseline_path)?;
    let current = RunReport::load_json(&current_path)?;

    if baseline.scenario_set.id != current.scenario_set.id {
        eprintln!(
            "Warning: comparing different scenario sets ('{}' vs '{}')",
            baseline.scenario_set.id, current.scenario_set.id
        );
    }

    let report = current.compare(&baseline);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} regressions, {} fixes, {} unchanged",
                report.regressions.len(),
                report.fixes.len(),
                report.unchanged
            );

            if !report.regressions.is_empty() {
                println!("\nRegressions:");
                for r in &report.regressions {
                    println!("  {r} passed -> failed");
                }
            }

            if !report.fixes.is_empty() {
                println!("\nFixes:");
                for f in &report.fixes {
                    println!("  {f} failed -> passed");
                }
            }

            if report.new_items > 0 {
                println!("\n{} new item(s)", report.new_items);
            }
            if report.removed_items > 0 {
                println!("{} removed item(s)", report.removed_items);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
