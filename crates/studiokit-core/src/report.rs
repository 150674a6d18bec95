//! Run report types with JSON persistence and regression detection.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// When an ordering was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Straight after the scenario's steps.
    AfterSteps,
    /// After saving the tree and loading it back.
    AfterReload,
}

/// An expected ordering that did not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    pub phase: Phase,
    /// Label of the parent whose children were checked.
    pub parent: String,
    pub expected: Vec<String>,
    /// `None` when no node carries the parent label.
    pub actual: Option<Vec<String>>,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_id: String,
    pub name: String,
    pub passed: bool,
    /// Steps applied before the scenario stopped (all of them on success).
    pub steps_applied: usize,
    #[serde(default)]
    pub mismatches: Vec<Mismatch>,
    /// Unexpected step outcome or persistence failure.
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// What a check exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Tolerance,
    Video,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Tolerance => write!(f, "tolerance"),
            CheckKind::Video => write!(f, "video"),
        }
    }
}

/// Outcome of a tolerance or video check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub kind: CheckKind,
    pub passed: bool,
    pub detail: String,
}

/// Summary of a scenario set (without the fixture or steps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSetSummary {
    pub id: String,
    pub name: String,
    pub scenario_count: usize,
    pub check_count: usize,
}

/// A complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub scenario_set: ScenarioSetSummary,
    pub scenarios: Vec<ScenarioResult>,
    pub checks: Vec<CheckResult>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed).count()
            + self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.scenarios.len() + self.checks.len() - self.passed_count()
    }

    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: RunReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    fn outcomes(&self) -> HashMap<String, bool> {
        self.scenarios
            .iter()
            .map(|s| (format!("scenario:{}", s.scenario_id), s.passed))
            .chain(
                self.checks
                    .iter()
                    .map(|c| (format!("check:{}", c.check_id), c.passed)),
            )
            .collect()
    }

    /// Compare this report against a baseline to detect regressions.
    pub fn compare(&self, baseline: &RunReport) -> RegressionReport {
        let baseline_outcomes = baseline.outcomes();
        let current_outcomes = self.outcomes();

        let mut regressions = Vec::new();
        let mut fixes = Vec::new();
        let mut unchanged = 0usize;
        let mut new_items = 0usize;

        for (key, &passed) in &current_outcomes {
            match baseline_outcomes.get(key) {
                Some(&true) if !passed => regressions.push(key.clone()),
                Some(&false) if passed => fixes.push(key.clone()),
                Some(_) => unchanged += 1,
                None => new_items += 1,
            }
        }
        regressions.sort();
        fixes.sort();

        let removed_items = baseline_outcomes
            .keys()
            .filter(|k| !current_outcomes.contains_key(*k))
            .count();

        RegressionReport {
            regressions,
            fixes,
            unchanged,
            new_items,
            removed_items,
        }
    }
}

/// Differences between two runs of the same scenario set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Items that passed in the baseline and fail now.
    pub regressions: Vec<String>,
    /// Items that failed in the baseline and pass now.
    pub fixes: Vec<String>,
    pub unchanged: usize,
    pub new_items: usize,
    pub removed_items: usize,
}

impl RegressionReport {
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::from("## studiokit comparison\n\n");
        md.push_str(&format!(
            "{} regressions, {} fixes, {} unchanged\n",
            self.regressions.len(),
            self.fixes.len(),
            self.unchanged
        ));

        if !self.regressions.is_empty() {
            md.push_str("\n### Regressions\n\n");
            for r in &self.regressions {
                md.push_str(&format!("- {r}\n"));
            }
        }
        if !self.fixes.is_empty() {
            md.push_str("\n### Fixes\n\n");
            for f in &self.fixes {
                md.push_str(&format!("- {f}\n"));
            }
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(scenarios: &[(&str, bool)], checks: &[(&str, bool)]) -> RunReport {
        RunReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            scenario_set: ScenarioSetSummary {
                id: "set".into(),
                name: "Set".into(),
                scenario_count: scenarios.len(),
                check_count: checks.len(),
            },
            scenarios: scenarios
                .iter()
                .map(|(id, passed)| ScenarioResult {
                    scenario_id: id.to_string(),
                    name: id.to_string(),
                    passed: *passed,
                    steps_applied: 1,
                    mismatches: vec![],
                    error: None,
                    duration_ms: 0,
                })
                .collect(),
            checks: checks
                .iter()
                .map(|(id, passed)| CheckResult {
                    check_id: id.to_string(),
                    kind: CheckKind::Tolerance,
                    passed: *passed,
                    detail: String::new(),
                })
                .collect(),
            duration_ms: 3,
        }
    }

    #[test]
    fn counts() {
        let r = report(&[("a", true), ("b", false)], &[("c", true)]);
        assert_eq!(r.passed_count(), 2);
        assert_eq!(r.failed_count(), 1);
        assert!(!r.all_passed());
    }

    #[test]
    fn compare_detects_regressions_and_fixes() {
        let baseline = report(&[("a", true), ("b", false), ("gone", true)], &[("c", true)]);
        let current = report(&[("a", false), ("b", true), ("new", true)], &[("c", true)]);

        let diff = current.compare(&baseline);
        assert_eq!(diff.regressions, vec!["scenario:a"]);
        assert_eq!(diff.fixes, vec!["scenario:b"]);
        assert_eq!(diff.unchanged, 1);
        assert_eq!(diff.new_items, 1);
        assert_eq!(diff.removed_items, 1);
        assert!(diff.has_regressions());
        assert!(diff.to_markdown().contains("- scenario:a"));
    }

    #[test]
    fn json_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let original = report(&[("a", true)], &[]);
        original.save_json(&path).unwrap();

        let loaded = RunReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.scenarios[0].scenario_id, "a");
    }
}
