//! The `studiokit run` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use studiokit_core::config::load_config_from;
use studiokit_core::engine::{EngineConfig, ProgressReporter, ScenarioEngine};
use studiokit_core::report::{CheckResult, RunReport, ScenarioResult};
use studiokit_core::scenario::load_scenario_path;
use studiokit_core::tolerance::ToleranceInput;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_scenario_start(&self, scenario_id: &str) {
        eprintln!("  Starting: {scenario_id}");
    }

    fn on_scenario_complete(&self, result: &ScenarioResult) {
        let status = if result.passed { "OK" } else { "FAIL" };
        eprintln!(
            "  Done: {} [{}] {} step(s) ({}ms)",
            result.scenario_id, status, result.steps_applied, result.duration_ms,
        );
        if let Some(error) = &result.error {
            eprintln!("    {error}");
        }
        for m in &result.mismatches {
            let actual = m
                .actual
                .as_ref()
                .map(|a| format!("{a:?}"))
                .unwrap_or_else(|| "<no such parent>".to_string());
            eprintln!(
                "    {:?} '{}': expected {:?}, got {actual}",
                m.phase, m.parent, m.expected
            );
        }
    }

    fn on_check_complete(&self, result: &CheckResult) {
        let status = if result.passed { "OK" } else { "FAIL" };
        eprintln!("  Check: {} [{}] {}", result.check_id, status, result.detail);
    }

    fn on_set_complete(&self, total: usize, passed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {passed}/{total} passed, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub fn execute(
    scenarios_path: PathBuf,
    filter: Option<String>,
    output: Option<PathBuf>,
    verify_reload: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    // Load config
    let config = load_config_from(config_path.as_deref())?;
    let output = output.unwrap_or_else(|| config.output_dir.clone());

    // Load scenario sets
    let mut sets = load_scenario_path(&scenarios_path)?;
    anyhow::ensure!(
        !sets.is_empty(),
        "no scenario sets found at {}",
        scenarios_path.display()
    );

    // Apply tag filter
    if let Some(filter_tags) = &filter {
        let tags: Vec<&str> = filter_tags.split(',').map(|s| s.trim()).collect();
        for set in &mut sets {
            set.retain_tagged(&tags);
        }
        tracing::debug!(?tags, "filtered scenarios by tag");
    }

    let engine = ScenarioEngine::new(EngineConfig {
        default_tolerance: ToleranceInput::Text(config.grading.default_tolerance.clone()),
        verify_reload,
    });
    let reporter = ConsoleReporter;

    std::fs::create_dir_all(&output)?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let mut failed = 0;

    for set in &sets {
        eprintln!(
            "studiokit v{}: running {} scenarios and {} checks from '{}'",
            env!("CARGO_PKG_VERSION"),
            set.scenarios.len(),
            set.check_count(),
            set.name
        );
        eprintln!();

        let report = engine.run(set, &reporter);

        print_summary(&report);

        let path = output.join(format!("report-{}-{timestamp}.json", set.id));
        report.save_json(&path)?;
        eprintln!("Results saved to: {}", path.display());

        failed += report.failed_count();
    }

    anyhow::ensure!(failed == 0, "{failed} scenario(s) or check(s) failed");

    Ok(())
}

fn print_summary(report: &RunReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Item", "Kind", "Result", "Detail"]);

    for s in &report.scenarios {
        let detail = match (&s.error, s.mismatches.len()) {
            (Some(e), _) => e.clone(),
            (None, 0) => format!("{} step(s)", s.steps_applied),
            (None, n) => format!("{n} ordering mismatch(es)"),
        };
        table.add_row(vec![
            Cell::new(&s.scenario_id),
            Cell::new("scenario"),
            Cell::new(if s.passed { "PASS" } else { "FAIL" }),
            Cell::new(detail),
        ]);
    }

    for c in &report.checks {
        table.add_row(vec![
            Cell::new(&c.check_id),
            Cell::new(c.kind),
            Cell::new(if c.passed { "PASS" } else { "FAIL" }),
            Cell::new(&c.detail),
        ]);
    }

    eprintln!("\n{table}");
}
