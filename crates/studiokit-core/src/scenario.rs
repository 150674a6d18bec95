//! TOML scenario sets.
//!
//! A scenario set pairs a container fixture with scenarios (operation steps
//! plus the orderings expected afterwards) and with numeric and video grading
//! checks. Sets are loaded from TOML files and directories, and validated.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::tolerance::ToleranceInput;
use crate::tree::{duplicate_label, ContainerNode, ContainerTree, NodeId};
use crate::video::{PlayerEvent, VideoGradingConfig};

/// A fixture plus everything to run against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fixture: ContainerTree,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub tolerance_checks: Vec<ToleranceCheck>,
    #[serde(default)]
    pub video_checks: Vec<VideoCheck>,
}

impl ScenarioSet {
    /// Keep only scenarios carrying at least one of `tags`.
    pub fn retain_tagged(&mut self, tags: &[&str]) {
        self.scenarios
            .retain(|s| s.tags.iter().any(|t| tags.contains(&t.as_str())));
    }

    pub fn check_count(&self) -> usize {
        self.tolerance_checks.len() + self.video_checks.len()
    }
}

/// A sequence of container operations and the orderings expected afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Parent label → expected child labels, in order.
    #[serde(default)]
    pub expected: BTreeMap<String, Vec<String>>,
}

/// One operation, optionally expected to fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub error: Option<ExpectedError>,
}

/// A container page action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Action {
    Move { source: NodeRef, target: NodeRef },
    Add { parent: NodeRef, label: String },
    Duplicate { node: NodeRef },
    Delete { node: NodeRef },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { source, target } => write!(f, "move {source} before {target}"),
            Action::Add { parent, label } => write!(f, "add '{label}' to {parent}"),
            Action::Duplicate { node } => write!(f, "duplicate {node}"),
            Action::Delete { node } => write!(f, "delete {node}"),
        }
    }
}

/// Failure a step is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedError {
    NotFound,
    InvalidMove,
}

impl ExpectedError {
    pub fn matches(&self, err: &TreeError) -> bool {
        matches!(
            (self, err),
            (ExpectedError::NotFound, TreeError::NotFound(_))
                | (ExpectedError::InvalidMove, TreeError::InvalidMove { .. })
        )
    }
}

/// How a step names a node: id, drag-handle index, or `{ label = "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeRef {
    Handle(usize),
    Id(NodeId),
    Label { label: String },
}

impl NodeRef {
    /// Resolve against the current state of `tree`.
    pub fn resolve(&self, tree: &ContainerTree) -> Result<NodeId, TreeError> {
        let found = match self {
            NodeRef::Id(id) => return Ok(id.clone()),
            NodeRef::Handle(handle) => tree.node_at_handle(*handle),
            NodeRef::Label { label } => tree.find_by_label(label),
        };
        found
            .map(|node| node.id.clone())
            .ok_or_else(|| TreeError::NotFound(NodeId::new(self.to_string())))
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Handle(h) => write!(f, "#{h}"),
            NodeRef::Id(id) => write!(f, "{id}"),
            NodeRef::Label { label } => write!(f, "'{label}'"),
        }
    }
}

/// A numeric answer check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToleranceCheck {
    #[serde(default)]
    pub id: Option<String>,
    pub actual: f64,
    pub expected: f64,
    /// Falls back to the configured default tolerance.
    #[serde(default)]
    pub tolerance: Option<ToleranceInput>,
    #[serde(default = "default_true")]
    pub relative: bool,
    /// Whether the comparison is expected to accept `actual`.
    pub pass: bool,
}

impl ToleranceCheck {
    pub fn display_id(&self, index: usize) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("tolerance-{}", index + 1))
    }
}

/// A video grading check: feed events, then inspect the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCheck {
    pub id: String,
    #[serde(default)]
    pub config: VideoGradingConfig,
    #[serde(default)]
    pub events: Vec<PlayerEvent>,
    #[serde(default)]
    pub expected_score: Option<f64>,
    #[serde(default)]
    pub expected_progress_message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Intermediate TOML structure for parsing scenario set files.
#[derive(Debug, Deserialize)]
struct TomlScenarioFile {
    scenario_set: TomlScenarioSetHeader,
    fixture: ContainerNode,
    #[serde(default)]
    scenarios: Vec<Scenario>,
    #[serde(default)]
    tolerance_checks: Vec<ToleranceCheck>,
    #[serde(default)]
    video_checks: Vec<VideoCheck>,
}

#[derive(Debug, Deserialize)]
struct TomlScenarioSetHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

/// Parse a single TOML file into a `ScenarioSet`.
pub fn parse_scenario_set(path: &Path) -> Result<ScenarioSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario set file: {}", path.display()))?;

    parse_scenario_set_str(&content, path)
}

/// Parse a TOML string into a `ScenarioSet` (useful for testing).
pub fn parse_scenario_set_str(content: &str, source_path: &Path) -> Result<ScenarioSet> {
    let parsed: TomlScenarioFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let fixture = ContainerTree::new(parsed.fixture)
        .with_context(|| format!("invalid fixture in {}", source_path.display()))?;

    Ok(ScenarioSet {
        id: parsed.scenario_set.id,
        name: parsed.scenario_set.name,
        description: parsed.scenario_set.description,
        fixture,
        scenarios: parsed.scenarios,
        tolerance_checks: parsed.tolerance_checks,
        video_checks: parsed.video_checks,
    })
}

/// Recursively load all `.toml` scenario set files from a directory.
pub fn load_scenario_directory(dir: &Path) -> Result<Vec<ScenarioSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            sets.extend(load_scenario_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_scenario_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// Load a file, or every set under a directory.
pub fn load_scenario_path(path: &Path) -> Result<Vec<ScenarioSet>> {
    if path.is_dir() {
        load_scenario_directory(path)
    } else {
        Ok(vec![parse_scenario_set(path)?])
    }
}

/// A warning from scenario set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The scenario or check ID (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a scenario set for common issues.
pub fn validate_scenario_set(set: &ScenarioSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Check for duplicate scenario IDs
    let mut seen_ids = HashSet::new();
    for scenario in &set.scenarios {
        if !seen_ids.insert(&scenario.id) {
            warnings.push(ValidationWarning {
                item_id: Some(scenario.id.clone()),
                message: format!("duplicate scenario ID: {}", scenario.id),
            });
        }
    }

    let mut label_counts: HashMap<&str, usize> = HashMap::new();
    *label_counts.entry(set.fixture.root().label.as_str()).or_default() += 1;
    for node in set.fixture.handles() {
        *label_counts.entry(node.label.as_str()).or_default() += 1;
    }

    for scenario in &set.scenarios {
        let warn = |message: String| ValidationWarning {
            item_id: Some(scenario.id.clone()),
            message,
        };

        if scenario.steps.is_empty() {
            warnings.push(warn("scenario has no steps".into()));
        }
        if scenario.expected.is_empty() {
            warnings.push(warn("scenario has no expected orderings".into()));
        }

        let added: HashSet<&str> = scenario
            .steps
            .iter()
            .filter_map(|s| match &s.action {
                Action::Add { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect();

        for key in scenario.expected.keys() {
            match label_counts.get(key.as_str()) {
                Some(&count) if count > 1 => warnings.push(warn(format!(
                    "expected ordering key '{key}' matches {count} fixture nodes; the first in order is used"
                ))),
                Some(_) => {}
                None if added.contains(key.as_str()) || is_duplicate_label(key) => {}
                None => warnings.push(warn(format!(
                    "expected ordering key '{key}' does not name any fixture node"
                ))),
            }
        }
    }

    for (idx, check) in set.tolerance_checks.iter().enumerate() {
        if let Some(tolerance) = &check.tolerance {
            if let Err(e) = tolerance.resolve(check.relative) {
                warnings.push(ValidationWarning {
                    item_id: Some(check.display_id(idx)),
                    message: e.to_string(),
                });
            }
        }
    }

    for check in &set.video_checks {
        if check.expected_score.is_none() && check.expected_progress_message.is_none() {
            warnings.push(ValidationWarning {
                item_id: Some(check.id.clone()),
                message: "video check has no expected score or progress message".into(),
            });
        }
    }

    warnings
}

fn is_duplicate_label(label: &str) -> bool {
    let prefix = duplicate_label("");
    label.starts_with(prefix.trim_end_matches('\''))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[scenario_set]
id = "container"
name = "Container page"

[fixture]
id = "container"
label = "Test Container"
kind = "group"

[[fixture.children]]
id = "group-a"
label = "Group A"
kind = "group"
children = [
    { id = "a1", label = "Group A Item 1" },
    { id = "a2", label = "Group A Item 2" },
]

[[fixture.children]]
id = "group-empty"
label = "Group Empty"
kind = "group"

[[scenarios]]
id = "drag-into-group"
name = "Drag Group A Item 2 before Group A Item 1"
tags = ["drag"]
steps = [
    { op = "move", source = "a2", target = 1 },
    { op = "delete", node = "ghost", error = "not_found" },
    { op = "duplicate", node = { label = "Group A Item 1" } },
]

[scenarios.expected]
"Group A" = ["Group A Item 2", "Group A Item 1", "Duplicate of 'Group A Item 1'"]

[[tolerance_checks]]
actual = 109.9
expected = 100.0
tolerance = "10%"
relative = false
pass = true

[[tolerance_checks]]
id = "float-absolute"
actual = 110.1
expected = 100.0
tolerance = 10.0
relative = false
pass = false

[[video_checks]]
id = "on-end"
events = [{ event = "ended" }]
expected_score = 1.0

[video_checks.config]
has_score = true

[video_checks.config.graders.scored_on_end]
"#;

    #[test]
    fn parse_valid_toml() {
        let set = parse_scenario_set_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(set.id, "container");
        assert_eq!(set.fixture.len(), 5);
        assert_eq!(set.scenarios.len(), 1);

        let steps = &set.scenarios[0].steps;
        assert!(matches!(
            &steps[0].action,
            Action::Move { source: NodeRef::Id(_), target: NodeRef::Handle(1) }
        ));
        assert_eq!(steps[1].error, Some(ExpectedError::NotFound));
        assert!(matches!(
            &steps[2].action,
            Action::Duplicate { node: NodeRef::Label { .. } }
        ));

        assert_eq!(set.tolerance_checks.len(), 2);
        assert!(set.tolerance_checks[0].tolerance == Some(ToleranceInput::Text("10%".into())));
        assert_eq!(set.tolerance_checks[0].display_id(0), "tolerance-1");
        assert_eq!(set.video_checks[0].config.graders.len(), 1);
        assert!(validate_scenario_set(&set).is_empty());
    }

    #[test]
    fn node_refs_resolve_against_tree() {
        let set = parse_scenario_set_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        let tree = &set.fixture;
        assert_eq!(NodeRef::Handle(2).resolve(tree).unwrap().as_str(), "a2");
        assert_eq!(
            NodeRef::Label { label: "Group Empty".into() }.resolve(tree).unwrap().as_str(),
            "group-empty"
        );
        assert!(NodeRef::Handle(9).resolve(tree).is_err());
        assert!(NodeRef::Label { label: "Nope".into() }.resolve(tree).is_err());
    }

    #[test]
    fn duplicate_fixture_ids_are_rejected() {
        let toml = r#"
[scenario_set]
id = "dupes"
name = "Dupes"

[fixture]
id = "root"
label = "Root"
kind = "group"
children = [{ id = "x", label = "X" }, { id = "x", label = "Y" }]
"#;
        let err = parse_scenario_set_str(toml, &PathBuf::from("d.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate node id"));
    }

    #[test]
    fn validate_flags_common_issues() {
        let toml = r#"
[scenario_set]
id = "issues"
name = "Issues"

[fixture]
id = "root"
label = "Root"
kind = "group"
children = [{ id = "x", label = "Same" }, { id = "y", label = "Same" }]

[[scenarios]]
id = "s"
name = "Empty"

[[scenarios]]
id = "s"
name = "Unknown key"
steps = [{ op = "add", parent = "root", label = "Discussion" }]

[scenarios.expected]
"Nowhere" = []
"Discussion" = []
"Same" = []
"Duplicate of 'Same'" = []

[[tolerance_checks]]
actual = 1.0
expected = 1.0
tolerance = "abc%"
pass = true
"#;
        let set = parse_scenario_set_str(toml, &PathBuf::from("v.toml")).unwrap();
        let warnings = validate_scenario_set(&set);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();

        assert!(messages.iter().any(|m| m.contains("duplicate scenario ID")));
        assert!(messages.iter().any(|m| m.contains("no steps")));
        assert!(messages.iter().any(|m| m.contains("no expected orderings")));
        assert!(messages.iter().any(|m| m.contains("'Nowhere' does not name")));
        assert!(messages.iter().any(|m| m.contains("matches 2 fixture nodes")));
        assert!(messages.iter().any(|m| m.contains("malformed tolerance")));
        assert!(!messages.iter().any(|m| m.contains("'Discussion'")));
        assert!(!messages.iter().any(|m| m.contains("Duplicate of")));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_scenario_set_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn unknown_op_is_rejected() {
        let toml = r#"
[scenario_set]
id = "ops"
name = "Ops"

[fixture]
id = "root"
label = "Root"

[[scenarios]]
id = "s"
name = "Bad op"
steps = [{ op = "explode", node = "root" }]
"#;
        assert!(parse_scenario_set_str(toml, &PathBuf::from("ops.toml")).is_err());
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("bad.toml"), "nope = [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sets = load_scenario_directory(dir.path()).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].id, "container");
        assert_eq!(load_scenario_path(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn retain_tagged_filters_scenarios() {
        let mut set = parse_scenario_set_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        set.retain_tagged(&["add"]);
        assert!(set.scenarios.is_empty());
        assert_eq!(set.check_count(), 3);
    }
}
