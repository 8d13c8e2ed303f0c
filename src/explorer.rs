// src/explorer.rs
//! One load → classify → normalize → aggregate pass, plus year selection.

use serde::Serialize;
use std::{collections::BTreeMap, fmt, path::PathBuf};
use tracing::{debug, info, warn};

use crate::aggregate::{self, YearSlice};
use crate::config::Settings;
use crate::error::{AcquisitionError, Error};
use crate::fetch::Acquirer;
use crate::process::{candidates, classify, normalize, NormalizeSummary, RecordTable, Value};

/// User-facing outcome of a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Loaded { rows: usize, columns: usize },
    DateColumn { column: String },
    NoDateColumn,
    NoValidDates { column: String },
    PartiallyParsed { column: String, unparseable: usize },
    CategoryUnavailable { column: String },
    NoYearSelected,
}

impl Status {
    pub fn is_warning(&self) -> bool {
        !matches!(
            self,
            Status::Loaded { .. } | Status::DateColumn { .. } | Status::PartiallyParsed { .. }
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loaded { rows, columns } => {
                write!(f, "Loaded {} records with {} columns.", rows, columns)
            }
            Status::DateColumn { column } => write!(f, "Using `{}` as the publication date.", column),
            Status::NoDateColumn => f.write_str(
                "No publication date column found; year charts and filters are unavailable.",
            ),
            Status::NoValidDates { column } => write!(
                f,
                "Column `{}` has no parseable dates; year charts and filters are unavailable.",
                column
            ),
            Status::PartiallyParsed { column, unparseable } => write!(
                f,
                "{} values in `{}` could not be parsed as dates and are left out of year charts.",
                unparseable, column
            ),
            Status::CategoryUnavailable { column } => {
                write!(f, "Column `{}` not found; top list skipped.", column)
            }
            Status::NoYearSelected => f.write_str("No year available to filter by."),
        }
    }
}

/// Everything the presentation layer needs after one load.
#[derive(Debug)]
pub struct Dashboard {
    pub table: RecordTable,
    pub date_column: Option<String>,
    pub normalize: Option<NormalizeSummary>,
    pub year_counts: Option<BTreeMap<i32, usize>>,
    pub top_categories: Option<Vec<(String, usize)>>,
    pub statuses: Vec<Status>,
    settings: Settings,
}

impl Dashboard {
    /// Classify, normalize and aggregate an acquired table. Never fails: each
    /// stage that cannot run is recorded as a `Status` and skipped.
    pub fn build(mut table: RecordTable, settings: &Settings) -> Self {
        let mut statuses = vec![Status::Loaded {
            rows: table.len(),
            columns: table.columns.len(),
        }];

        let date_column = classify(&table.columns);
        let all = candidates(&table.columns);
        if all.len() > 1 {
            debug!(?all, chosen = ?date_column, "several date-like columns");
        }

        let mut summary = None;
        match &date_column {
            None => {
                warn!("no publication date column");
                statuses.push(Status::NoDateColumn);
            }
            Some(column) => {
                statuses.push(Status::DateColumn {
                    column: column.clone(),
                });
                match normalize(&mut table, column) {
                    Ok(s) => {
                        if s.unparseable > 0 {
                            statuses.push(Status::PartiallyParsed {
                                column: column.clone(),
                                unparseable: s.unparseable,
                            });
                        }
                        summary = Some(s);
                    }
                    Err(Error::NoValidDates { column, .. }) => {
                        statuses.push(Status::NoValidDates { column });
                    }
                    Err(e) => {
                        warn!(error = %e, "normalization skipped");
                        statuses.push(Status::NoDateColumn);
                    }
                }
            }
        }

        let year_counts = summary.as_ref().and_then(|_| aggregate::year_counts(&table));

        let top_categories =
            match aggregate::top_k(&table, &settings.category_column, settings.top_k) {
                Ok(top) => Some(top),
                Err(e) => {
                    info!(error = %e, "category aggregate skipped");
                    statuses.push(Status::CategoryUnavailable {
                        column: settings.category_column.clone(),
                    });
                    None
                }
            };

        Self {
            table,
            date_column,
            normalize: summary,
            year_counts,
            top_categories,
            statuses,
            settings: settings.clone(),
        }
    }

    pub fn category_column(&self) -> &str {
        &self.settings.category_column
    }

    pub fn columns(&self) -> &[String] {
        &self.table.columns
    }

    /// The first `preview_rows` records.
    pub fn preview(&self) -> &[Vec<Value>] {
        let n = self.settings.preview_rows.min(self.table.len());
        &self.table.rows[..n]
    }

    /// Years offered by the selector, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.year_counts
            .as_ref()
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The default selection: the earliest year, as a sorted selector would show.
    pub fn default_year(&self) -> Option<i32> {
        self.years().first().copied()
    }

    /// Records for `year`, truncated to the display limit. `None` when the
    /// year aggregates were skipped.
    pub fn filter_year(&self, year: i32) -> Option<YearSlice<'_>> {
        self.year_counts.as_ref()?;
        Some(aggregate::filter_year(
            &self.table,
            year,
            Some(self.settings.display_limit),
        ))
    }

    /// Columns shown next to a year slice: the configured ones plus the date column.
    pub fn display_columns(&self) -> Vec<String> {
        let mut cols = self.settings.display_columns.clone();
        if let Some(date) = &self.date_column {
            if !cols.contains(date) {
                cols.push(date.clone());
            }
        }
        cols
    }
}

/// A session: owns the acquisition cache and the settings.
pub struct Explorer {
    acquirer: Acquirer,
    settings: Settings,
}

impl Explorer {
    pub fn new(settings: Settings) -> Result<Self, AcquisitionError> {
        let staging: PathBuf = settings.staging_dir.clone();
        Ok(Self {
            acquirer: Acquirer::new(settings.strategy, staging)?,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn acquirer(&self) -> &Acquirer {
        &self.acquirer
    }

    /// Acquire the configured source and build its dashboard. Only acquisition
    /// failures are returned as errors.
    pub async fn load(&mut self) -> Result<Dashboard, AcquisitionError> {
        let table = self
            .acquirer
            .acquire(&self.settings.source, self.settings.row_cap)
            .await?;
        // the cached table stays pristine; derived columns go on a copy
        Ok(Dashboard::build((*table).clone(), &self.settings))
    }
}
