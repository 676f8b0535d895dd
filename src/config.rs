//! Sweep configuration
//!
//! Loaded from a TOML file; every section and field has a default so a
//! missing or partial file still produces a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cleanup::{CleanupPlan, SearchField, SearchSpec};
use crate::error::CleanupError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    #[serde(default)]
    pub supersession: SupersessionConfig,
}

/// Where the catalog lives and how to talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog admin API
    #[serde(default = "default_url")]
    pub url: String,

    /// Bearer token (optional)
    #[serde(default)]
    pub api_token: Option<String>,

    /// Records requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_token: None,
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Obsolescence patterns, applied in the order listed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Matched against update titles
    #[serde(default = "default_title_patterns")]
    pub titles: Vec<String>,

    /// Matched against each product title of an update
    #[serde(default = "default_product_patterns")]
    pub products: Vec<String>,

    /// Matched against the classification title; always declined without asking
    #[serde(default = "default_classification_patterns")]
    pub classifications: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            titles: default_title_patterns(),
            products: default_product_patterns(),
            classifications: default_classification_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupersessionConfig {
    /// Upper bound on passes when `--until-stable` is given
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
}

impl Default for SupersessionConfig {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
        }
    }
}

// Defaults
fn default_url() -> String { "http://localhost:8530".to_string() }
fn default_page_size() -> u32 { 500 }
fn default_timeout() -> u64 { 30 }
fn default_max_passes() -> u32 { 10 }

fn default_title_patterns() -> Vec<String> {
    [
        "Itanium",
        "ia64",
        "ARM64",
        "Windows XP",
        "Windows Vista",
        "Windows 7",
        "Windows 8",
        "Server 2003",
        "Server 2008",
        "Internet Explorer 7",
        "Internet Explorer 8",
        "Internet Explorer 9",
        "Internet Explorer 10",
        "Beta",
        "Preview",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_product_patterns() -> Vec<String> {
    [
        "Office 2003",
        "Office 2007",
        "Office 2010",
        "Exchange Server 2007",
        "SQL Server 2005",
        "SQL Server 2008",
        "Silverlight",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_classification_patterns() -> Vec<String> {
    vec!["Drivers".to_string()]
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

impl Config {
    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Compile the pattern lists into search specs
    pub fn cleanup_plan(&self) -> Result<CleanupPlan, CleanupError> {
        Ok(CleanupPlan {
            titles: compile(&self.patterns.titles, SearchField::Title)?,
            products: compile(&self.patterns.products, SearchField::ProductTitles)?,
            classifications: compile(
                &self.patterns.classifications,
                SearchField::UpdateClassificationTitle,
            )?,
        })
    }
}

fn compile(patterns: &[String], field: SearchField) -> Result<Vec<SearchSpec>, CleanupError> {
    patterns
        .iter()
        .map(|pattern| SearchSpec::new(pattern, field))
        .collect()
}
