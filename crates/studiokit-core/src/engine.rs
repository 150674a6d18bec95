//! Scenario engine.
//!
//! Runs every scenario of a set against a fresh copy of its fixture, checks
//! the expected orderings, then saves and reloads the tree and checks them
//! again. Tolerance and video checks run after the scenarios.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::TreeError;
use crate::report::{
    CheckKind, CheckResult, Mismatch, Phase, RunReport, ScenarioResult, ScenarioSetSummary,
};
use crate::scenario::{Action, Scenario, ScenarioSet, Step, ToleranceCheck, VideoCheck};
use crate::tolerance::ToleranceInput;
use crate::tree::{ContainerTree, NodeKind};
use crate::video::{format_points, VideoGrading};

/// Configuration for the scenario engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tolerance for checks that do not author one.
    pub default_tolerance: ToleranceInput,
    /// Re-check orderings after a save/load round-trip.
    pub verify_reload: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_tolerance: ToleranceInput::default(),
            verify_reload: true,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter {
    fn on_scenario_start(&self, scenario_id: &str);
    fn on_scenario_complete(&self, result: &ScenarioResult);
    fn on_check_complete(&self, result: &CheckResult);
    fn on_set_complete(&self, total: usize, passed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_scenario_start(&self, _: &str) {}
    fn on_scenario_complete(&self, _: &ScenarioResult) {}
    fn on_check_complete(&self, _: &CheckResult) {}
    fn on_set_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Apply one action to `tree`.
pub fn apply_action(tree: &mut ContainerTree, action: &Action) -> Result<(), TreeError> {
    match action {
        Action::Move { source, target } => {
            let source = source.resolve(tree)?;
            let target = target.resolve(tree)?;
            tree.move_before(&source, &target)
        }
        Action::Add { parent, label } => {
            let parent = parent.resolve(tree)?;
            tree.add_node(&parent, label.clone(), NodeKind::Item).map(|_| ())
        }
        Action::Duplicate { node } => {
            let node = node.resolve(tree)?;
            tree.duplicate(&node).map(|_| ())
        }
        Action::Delete { node } => {
            let node = node.resolve(tree)?;
            tree.delete(&node).map(|_| ())
        }
    }
}

/// Apply a step, honouring its expected failure. Returns a description of
/// any unexpected outcome.
fn apply_step(tree: &mut ContainerTree, step: &Step) -> Result<(), String> {
    match (apply_action(tree, &step.action), step.error) {
        (Ok(()), None) => Ok(()),
        (Ok(()), Some(expected)) => Err(format!(
            "{} succeeded but was expected to fail with {expected:?}",
            step.action
        )),
        (Err(e), Some(expected)) if expected.matches(&e) => Ok(()),
        (Err(e), _) => Err(format!("{} failed: {e}", step.action)),
    }
}

/// Compare `tree` against expected orderings.
pub fn verify_orderings(
    tree: &ContainerTree,
    expected: &BTreeMap<String, Vec<String>>,
    phase: Phase,
) -> Vec<Mismatch> {
    expected
        .iter()
        .filter_map(|(parent, children)| {
            let actual: Option<Vec<String>> = tree
                .find_by_label(parent)
                .map(|node| node.children.iter().map(|c| c.label.clone()).collect());
            if actual.as_ref() == Some(children) {
                None
            } else {
                Some(Mismatch {
                    phase,
                    parent: parent.clone(),
                    expected: children.clone(),
                    actual,
                })
            }
        })
        .collect()
}

/// Save `tree` as JSON and load it back.
fn reload(tree: &ContainerTree) -> Result<ContainerTree, String> {
    let json = serde_json::to_string(tree).map_err(|e| format!("failed to save tree: {e}"))?;
    serde_json::from_str(&json).map_err(|e| format!("failed to reload tree: {e}"))
}

/// The scenario engine.
pub struct ScenarioEngine {
    config: EngineConfig,
}

impl ScenarioEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every scenario and check of `set`.
    pub fn run(&self, set: &ScenarioSet, reporter: &dyn ProgressReporter) -> RunReport {
        let start = Instant::now();
        info!(
            set = %set.id,
            scenarios = set.scenarios.len(),
            checks = set.check_count(),
            "running scenario set"
        );

        let scenarios: Vec<ScenarioResult> = set
            .scenarios
            .iter()
            .map(|scenario| {
                reporter.on_scenario_start(&scenario.id);
                let result = self.run_scenario(&set.fixture, scenario);
                reporter.on_scenario_complete(&result);
                result
            })
            .collect();

        let tolerance_checks = set
            .tolerance_checks
            .iter()
            .enumerate()
            .map(|(idx, check)| self.run_tolerance_check(idx, check));
        let video_checks = set.video_checks.iter().map(|check| self.run_video_check(check));
        let checks: Vec<CheckResult> = tolerance_checks
            .chain(video_checks)
            .inspect(|result| reporter.on_check_complete(result))
            .collect();

        let report = RunReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            scenario_set: ScenarioSetSummary {
                id: set.id.clone(),
                name: set.name.clone(),
                scenario_count: set.scenarios.len(),
                check_count: set.check_count(),
            },
            scenarios,
            checks,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        reporter.on_set_complete(
            report.scenarios.len() + report.checks.len(),
            report.passed_count(),
            report.failed_count(),
            start.elapsed(),
        );
        report
    }

    /// Run one scenario against a copy of `fixture`.
    pub fn run_scenario(&self, fixture: &ContainerTree, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        let mut tree = fixture.clone();
        let mut steps_applied = 0;
        let mut error = None;

        for step in &scenario.steps {
            if let Err(e) = apply_step(&mut tree, step) {
                error = Some(e);
                break;
            }
            steps_applied += 1;
        }

        let mut mismatches = Vec::new();
        if error.is_none() {
            mismatches = verify_orderings(&tree, &scenario.expected, Phase::AfterSteps);
            if self.config.verify_reload {
                match reload(&tree) {
                    Ok(reloaded) => mismatches.extend(verify_orderings(
                        &reloaded,
                        &scenario.expected,
                        Phase::AfterReload,
                    )),
                    Err(e) => error = Some(e),
                }
            }
        }

        let passed = error.is_none() && mismatches.is_empty();
        debug!(
            scenario = %scenario.id,
            passed,
            steps_applied,
            mismatches = mismatches.len(),
            "scenario finished"
        );

        ScenarioResult {
            scenario_id: scenario.id.clone(),
            name: scenario.name.clone(),
            passed,
            steps_applied,
            mismatches,
            error,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn run_tolerance_check(&self, index: usize, check: &ToleranceCheck) -> CheckResult {
        let check_id = check.display_id(index);
        let tolerance = check
            .tolerance
            .as_ref()
            .unwrap_or(&self.config.default_tolerance);

        let (passed, detail) = match tolerance.compare(check.actual, check.expected, check.relative) {
            Ok(accepted) => (
                accepted == check.pass,
                format!(
                    "{} vs {} within {} ({}): {}, expected {}",
                    check.actual,
                    check.expected,
                    tolerance,
                    if check.relative { "relative" } else { "absolute" },
                    if accepted { "accepted" } else { "rejected" },
                    if check.pass { "accepted" } else { "rejected" },
                ),
            ),
            Err(e) => (false, e.to_string()),
        };

        CheckResult {
            check_id,
            kind: CheckKind::Tolerance,
            passed,
            detail,
        }
    }

    pub fn run_video_check(&self, check: &VideoCheck) -> CheckResult {
        let mut grading = VideoGrading::new(&check.config);
        for event in &check.events {
            grading.handle(*event);
        }

        let message = grading.progress_message();
        let mut problems = Vec::new();
        if let Some(expected) = check.expected_score {
            let actual = grading.score();
            if actual != Some(expected) {
                problems.push(format!(
                    "score {} != expected {}",
                    actual.map(format_points).unwrap_or_else(|| "none".into()),
                    format_points(expected)
                ));
            }
        }
        if let Some(expected) = &check.expected_progress_message {
            if &message != expected {
                problems.push(format!("message '{message}' != expected '{expected}'"));
            }
        }

        CheckResult {
            check_id: check.id.clone(),
            kind: CheckKind::Video,
            passed: problems.is_empty(),
            detail: if problems.is_empty() {
                message
            } else {
                problems.join("; ")
            },
        }
    }
}
