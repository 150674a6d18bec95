//! The `studiokit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create studiokit.toml
    if std::path::Path::new("studiokit.toml").exists() {
        println!("studiokit.toml already exists, skipping.");
    } else {
        std::fs::write("studiokit.toml", SAMPLE_CONFIG)?;
        println!("Created studiokit.toml");
    }

    // Create example scenario set
    std::fs::create_dir_all("scenarios")?;
    let example_path = std::path::Path::new("scenarios/example.toml");
    if example_path.exists() {
        println!("scenarios/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_SCENARIO_SET)?;
        println!("Created scenarios/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit studiokit.toml with your documentation locations");
    println!("  2. Run: studiokit validate --scenarios scenarios/example.toml");
    println!("  3. Run: studiokit run --scenarios scenarios/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# studiokit configuration

output_dir = "./studiokit-results"

[grading]
default_tolerance = "0.001%"

# ${VAR} references in url_base and pdf_base are read from the environment
[help]
url_base = "https://docs.example.org/course_author"
version = "latest"
pdf_base = "https://media.example.org/pdfs"
pdf_file = "course_author.pdf"

[help.pages]
default = "index.html"
container = "developing_course/course_components.html"
outline = "developing_course/course_outline.html"

[help.locales]
default = "en"
en = "en"
"#;

const EXAMPLE_SCENARIO_SET: &str = r#"[scenario_set]
id = "example"
name = "Example Scenario Set"
description = "A small container to get started"

[fixture]
id = "unit"
label = "Unit"
kind = "group"

[[fixture.children]]
id = "intro"
label = "Introduction"
kind = "group"
children = [
    { id = "welcome", label = "Welcome" },
    { id = "overview", label = "Overview" },
]

[[fixture.children]]
id = "quiz"
label = "Quiz"
kind = "group"

[[scenarios]]
id = "swap-intro"
name = "Drag Overview before Welcome"
tags = ["drag"]
steps = [{ op = "move", source = "overview", target = "welcome" }]

[scenarios.expected]
"Introduction" = ["Overview", "Welcome"]

[[scenarios]]
id = "fill-quiz"
name = "Add a problem to the quiz and copy it"
tags = ["add", "duplicate"]
steps = [
    { op = "add", parent = "quiz", label = "Problem" },
    { op = "duplicate", node = { label = "Problem" } },
]

[scenarios.expected]
"Quiz" = ["Problem", "Duplicate of 'Problem'"]

[[tolerance_checks]]
actual = 9.81
expected = 9.8
tolerance = "1%"
pass = true
"#;
