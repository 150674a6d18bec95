//! Tool configuration and online-help link resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::tolerance::{ToleranceSpec, DEFAULT_TOLERANCE};

/// Key used when a page token or language has no entry of its own.
pub const DEFAULT_KEY: &str = "default";

/// Top-level studiokit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudiokitConfig {
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub help: Option<HelpConfig>,
    /// Default output directory for run reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./studiokit-results")
}

impl Default for StudiokitConfig {
    fn default() -> Self {
        Self {
            grading: GradingConfig::default(),
            help: None,
            output_dir: default_output_dir(),
        }
    }
}

/// Grading defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Tolerance used when a check does not author one.
    #[serde(default = "default_tolerance")]
    pub default_tolerance: String,
}

fn default_tolerance() -> String {
    DEFAULT_TOLERANCE.to_string()
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            default_tolerance: default_tolerance(),
        }
    }
}

impl GradingConfig {
    pub fn tolerance(&self) -> Result<ToleranceSpec> {
        ToleranceSpec::parse(&self.default_tolerance)
            .context("invalid grading.default_tolerance in config")
    }
}

/// Where the documentation lives and how pages map onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpConfig {
    pub url_base: String,
    pub version: String,
    pub pdf_base: String,
    pub pdf_file: String,
    /// Page token → path under the versioned docs root.
    #[serde(default)]
    pub pages: HashMap<String, String>,
    /// Language code → language directory.
    #[serde(default)]
    pub locales: HashMap<String, String>,
}

/// Resolved help links for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpLinks {
    pub doc_url: String,
    pub pdf_url: String,
}

impl HelpConfig {
    fn lookup<'a>(
        table: &'a HashMap<String, String>,
        section: &str,
        key: &str,
    ) -> Result<&'a str> {
        table
            .get(key)
            .or_else(|| table.get(DEFAULT_KEY))
            .map(String::as_str)
            .with_context(|| {
                format!("help.{section} has no entry for '{key}' and no '{DEFAULT_KEY}' entry")
            })
    }

    /// Documentation and PDF links for `page_token` in `language`.
    pub fn online_help_info(&self, page_token: &str, language: &str) -> Result<HelpLinks> {
        let page_path = Self::lookup(&self.pages, "pages", page_token)?;
        let language_dir = Self::lookup(&self.locales, "locales", language)?;

        Ok(HelpLinks {
            doc_url: format!(
                "{}/{}/{}/{}",
                self.url_base, language_dir, self.version, page_path
            ),
            pdf_url: format!("{}/{}/{}", self.pdf_base, self.version, self.pdf_file),
        })
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `studiokit.toml` in the current directory
/// 2. `~/.config/studiokit/config.toml`
///
/// `STUDIOKIT_DEFAULT_TOLERANCE` overrides `grading.default_tolerance`.
pub fn load_config() -> Result<StudiokitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<StudiokitConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("studiokit.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!("loading config from {}", path.display());
            parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => StudiokitConfig::default(),
    };

    if let Ok(tolerance) = std::env::var("STUDIOKIT_DEFAULT_TOLERANCE") {
        config.grading.default_tolerance = tolerance;
    }

    Ok(config)
}

/// Parse a TOML config string, expanding `${VAR}` references in help URLs.
pub fn parse_config_str(content: &str) -> Result<StudiokitConfig> {
    let mut config: StudiokitConfig = toml::from_str(content)?;
    if let Some(help) = config.help.as_mut() {
        help.url_base = resolve_env_vars(&help.url_base);
        help.pdf_base = resolve_env_vars(&help.pdf_base);
    }
    config.grading.tolerance()?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("studiokit"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELP_TOML: &str = r#"
[grading]
default_tolerance = "0.5%"

[help]
url_base = "https://docs.example.org/course_author"
version = "latest"
pdf_base = "https://media.example.org/pdfs"
pdf_file = "course_author.pdf"

[help.pages]
default = "index.html"
container = "developing_course/course_components.html"

[help.locales]
default = "en"
en = "en"
fr = "fr_FR"
"#;

    fn help() -> HelpConfig {
        parse_config_str(HELP_TOML).unwrap().help.unwrap()
    }

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_STUDIOKIT_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_STUDIOKIT_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_STUDIOKIT_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_STUDIOKIT_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_rescan_values() {
        std::env::set_var("_STUDIOKIT_TEST_SELF", "${_STUDIOKIT_TEST_SELF}");
        assert_eq!(
            resolve_env_vars("a/${_STUDIOKIT_TEST_SELF}/b"),
            "a/${_STUDIOKIT_TEST_SELF}/b"
        );
        std::env::remove_var("_STUDIOKIT_TEST_SELF");
        assert_eq!(resolve_env_vars("x${_STUDIOKIT_UNSET_VAR}y"), "xy");
        assert_eq!(resolve_env_vars("open ${brace"), "open ${brace");
    }

    #[test]
    fn default_matches_empty_file() {
        let from_file = parse_config_str("").unwrap();
        let default = StudiokitConfig::default();
        assert_eq!(default.output_dir, from_file.output_dir);
        assert_eq!(default.output_dir, PathBuf::from("./studiokit-results"));
        assert_eq!(
            default.grading.default_tolerance,
            from_file.grading.default_tolerance
        );
    }

    #[test]
    fn default_config() {
        let config = StudiokitConfig::default();
        assert_eq!(config.grading.default_tolerance, "0.001%");
        assert!(config.help.is_none());
        assert_eq!(
            config.grading.tolerance().unwrap(),
            ToleranceSpec::Percentage(0.001)
        );
    }

    #[test]
    fn known_page_and_language() {
        let links = help().online_help_info("container", "fr").unwrap();
        assert_eq!(
            links.doc_url,
            "https://docs.example.org/course_author/fr_FR/latest/developing_course/course_components.html"
        );
        assert_eq!(
            links.pdf_url,
            "https://media.example.org/pdfs/latest/course_author.pdf"
        );
    }

    #[test]
    fn unknown_keys_fall_back_to_default() {
        let links = help().online_help_info("outline", "de").unwrap();
        assert_eq!(
            links.doc_url,
            "https://docs.example.org/course_author/en/latest/index.html"
        );
    }

    #[test]
    fn missing_default_is_an_error() {
        let mut help = help();
        help.pages.remove(DEFAULT_KEY);
        let err = help.online_help_info("outline", "en").unwrap_err();
        assert!(err.to_string().contains("help.pages"));
    }

    #[test]
    fn invalid_default_tolerance_is_rejected() {
        let bad = "[grading]\ndefault_tolerance = \"lots\"\n";
        assert!(parse_config_str(bad).is_err());
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studiokit.toml");
        std::fs::write(&path, HELP_TOML).unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert!(config.help.is_some());
        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
