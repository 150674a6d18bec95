//! The `studiokit tree` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use studiokit_core::engine::apply_action;
use studiokit_core::scenario::parse_scenario_set;
use studiokit_core::tree::{ContainerTree, Reorderable};

pub fn execute(scenarios_path: PathBuf, scenario_id: Option<String>, format: String) -> Result<()> {
    let set = parse_scenario_set(&scenarios_path)?;
    let mut tree = set.fixture.clone();

    if let Some(id) = &scenario_id {
        let scenario = set
            .scenarios
            .iter()
            .find(|s| &s.id == id)
            .with_context(|| format!("scenario '{id}' not found in '{}'", set.id))?;

        tracing::debug!(scenario = %id, steps = scenario.steps.len(), "replaying scenario");
        for (idx, step) in scenario.steps.iter().enumerate() {
            match apply_action(&mut tree, &step.action) {
                Ok(()) => {}
                Err(e) if step.error.is_some_and(|expected| expected.matches(&e)) => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("step {} ({})", idx + 1, step.action))
                }
            }
        }
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&tree)?),
        _ => print_handles(&tree),
    }

    Ok(())
}

fn print_handles(tree: &ContainerTree) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Handle", "Id", "Kind", "Label"]);

    for (handle, node) in tree.handles().into_iter().enumerate() {
        let depth = tree
            .root()
            .path_to(&node.id)
            .map(|p| p.len())
            .unwrap_or(1);
        table.add_row(vec![
            Cell::new(handle),
            Cell::new(&node.id),
            Cell::new(node.kind),
            Cell::new(format!("{}{}", "  ".repeat(depth - 1), node.label)),
        ]);
    }

    println!("{}", tree.root().label);
    println!("{table}");
}
