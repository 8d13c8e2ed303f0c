//! Explorer settings, loaded from an optional YAML file.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, str::FromStr};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fetch::Strategy;

/// The CORD-19 `metadata.csv` snapshot the dashboard was built around.
pub const DEFAULT_SOURCE: &str =
    "https://drive.google.com/uc?export=download&id=1xNK8OfdT33pR-hQKB2wlKemQDSGBBWd9";
pub const DEFAULT_ROW_CAP: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub source: String,
    /// `null` reads the whole source.
    #[serde(default = "default_row_cap")]
    pub row_cap: Option<usize>,
    pub strategy: Strategy,
    pub staging_dir: PathBuf,
    pub preview_rows: usize,
    pub display_limit: usize,
    pub top_k: usize,
    pub category_column: String,
    /// Columns shown for the year filter; missing ones are skipped.
    pub display_columns: Vec<String>,
}

fn default_row_cap() -> Option<usize> {
    Some(DEFAULT_ROW_CAP)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            row_cap: default_row_cap(),
            strategy: Strategy::Auto,
            staging_dir: std::env::temp_dir().join("cordscope"),
            preview_rows: 5,
            display_limit: 20,
            top_k: 10,
            category_column: "journal".to_string(),
            display_columns: vec!["title".to_string(), "journal".to_string()],
        }
    }
}

impl Settings {
    /// Read settings from a YAML file. Keys left out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        let settings = Self::from_yaml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::Config("source must not be empty".into()));
        }
        if self.category_column.trim().is_empty() {
            return Err(Error::Config("category_column must not be empty".into()));
        }
        Ok(())
    }
}

/// A `--row-cap` value: a count, or `none`/`all` for no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCap(pub Option<usize>);

impl FromStr for RowCap {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "all" | "unlimited" => Ok(RowCap(None)),
            n => n
                .parse::<usize>()
                .map(|n| RowCap(Some(n)))
                .map_err(|_| format!("`{}` is not a row count or `none`", s)),
        }
    }
}
