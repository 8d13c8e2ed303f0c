// src/process/normalize.rs
use chrono::Datelike;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{cell, date_parser::parse_value, DerivedColumns, ParsedDate, RecordTable};
use crate::error::{Error, Result};

/// Parse counts for one normalization pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeSummary {
    pub column: String,
    pub records: usize,
    pub valid: usize,
    pub unparseable: usize,
}

/// Parse `column` into the derived date and year columns of `table`.
///
/// Cells that do not parse become `ParsedDate::Unparseable` and get no year;
/// no record is ever dropped. If *no* cell parses the table is left untouched
/// and `Error::NoValidDates` is returned.
#[tracing::instrument(level = "info", skip(table), fields(records = table.len()))]
pub fn normalize(table: &mut RecordTable, column: &str) -> Result<NormalizeSummary> {
    let idx = table
        .column_index(column)
        .ok_or(Error::NoDateColumnFound)?;

    let dates: Vec<ParsedDate> = table
        .rows
        .iter()
        .map(|row| match parse_value(cell(row, idx)) {
            Some(dt) => ParsedDate::Valid(dt),
            None => ParsedDate::Unparseable,
        })
        .collect();

    let valid = dates.iter().filter(|d| d.valid().is_some()).count();
    let records = dates.len();

    if valid == 0 {
        warn!(column, records, "no cell parsed as a date");
        return Err(Error::NoValidDates {
            column: column.to_string(),
            records,
        });
    }

    let years: Vec<Option<i32>> = dates.iter().map(|d| d.valid().map(|dt| dt.year())).collect();

    let summary = NormalizeSummary {
        column: column.to_string(),
        records,
        valid,
        unparseable: records - valid,
    };
    if summary.unparseable > 0 {
        debug!(column, unparseable = summary.unparseable, "cells left without a date");
    }
    info!(column, valid, records, "derived publication years");

    table.attach_derived(DerivedColumns {
        source_column: column.to_string(),
        dates,
        years,
    });
    Ok(summary)
}
