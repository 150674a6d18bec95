//! The `studiokit check` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use studiokit_core::config::load_config_from;
use studiokit_core::tolerance::{compare_with_tolerance, ToleranceInput};

pub fn execute(
    actual: f64,
    expected: f64,
    tolerance: Option<String>,
    relative: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let tolerance = match tolerance {
        Some(t) => t,
        None => load_config_from(config_path.as_deref())?
            .grading
            .default_tolerance,
    };

    let input = ToleranceInput::Text(tolerance.clone());
    let (spec, relative) = input
        .resolve(relative)
        .with_context(|| format!("cannot check {actual} against {expected}"))?;
    let bound = spec.bound(actual, expected, relative);
    let accepted = compare_with_tolerance(actual, expected, spec, relative);

    println!(
        "{}: |{actual} - {expected}| = {} {} {bound} ({tolerance}, {})",
        if accepted { "ACCEPTED" } else { "REJECTED" },
        (actual - expected).abs(),
        if accepted { "<=" } else { ">" },
        if relative { "relative" } else { "absolute" },
    );

    if !accepted {
        std::process::exit(1);
    }

    Ok(())
}
