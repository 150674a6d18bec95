//! studiokit CLI — grading checks and container ordering scenarios.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "studiokit",
    version,
    about = "Tolerance grading and container ordering checks for course authoring"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a numeric answer against the expected value
    Check {
        /// Learner's answer
        #[arg(long, allow_hyphen_values = true)]
        actual: f64,

        /// Expected answer
        #[arg(long, allow_hyphen_values = true)]
        expected: f64,

        /// Tolerance, e.g. "5%" or "0.25" (default: grading.default_tolerance)
        #[arg(long)]
        tolerance: Option<String>,

        /// Treat a percentage as a fraction of |expected| instead of the larger magnitude
        #[arg(long)]
        absolute: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run scenario sets
    Run {
        /// Path to .toml scenario set or directory
        #[arg(long)]
        scenarios: PathBuf,

        /// Filter scenarios by tags (comma-separated)
        #[arg(long)]
        filter: Option<String>,

        /// Output directory (default: output_dir from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the save/reload re-check
        #[arg(long)]
        no_reload: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate scenario set TOML files
    Validate {
        /// Path to scenario set file or directory
        #[arg(long)]
        scenarios: PathBuf,
    },

    /// Compare two run reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show the drag handles of a scenario set's fixture
    Tree {
        /// Path to a .toml scenario set
        #[arg(long)]
        scenarios: PathBuf,

        /// Apply this scenario's steps before printing
        #[arg(long)]
        scenario: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Resolve the online help links for a page
    HelpUrl {
        /// Page token, e.g. "container"
        #[arg(long, default_value = "default")]
        page: String,

        /// Language code
        #[arg(long, default_value = "en")]
        lang: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example scenario set
    Init,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("studiokit=info,studiokit_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            actual,
            expected,
            tolerance,
            absolute,
            config,
        } => commands::check::execute(actual, expected, tolerance, !absolute, config),
        Commands::Run {
            scenarios,
            filter,
            output,
            no_reload,
            config,
        } => commands::run::execute(scenarios, filter, output, !no_reload, config),
        Commands::Validate { scenarios } => commands::validate::execute(scenarios),
        Commands::Compare {
            baseline,
            current,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, fail_on_regression, format),
        Commands::Tree {
            scenarios,
            scenario,
            format,
        } => commands::tree::execute(scenarios, scenario, format),
        Commands::HelpUrl { page, lang, config } => {
            commands::help_url::execute(page, lang, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
