//! The `studiokit help-url` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use studiokit_core::config::load_config_from;

pub fn execute(page: String, lang: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let help = config
        .help
        .context("no [help] section in config; run `studiokit init` for a sample")?;

    let links = help.online_help_info(&page, &lang)?;
    println!("doc: {}", links.doc_url);
    println!("pdf: {}", links.pdf_url);

    Ok(())
}
