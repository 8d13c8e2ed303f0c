// src/process/mod.rs
use crate::error::AcquisitionError;
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use serde::Serialize;
use std::{
    fmt,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};
use tracing::{debug, warn};
use zip::ZipArchive;

pub mod classify;
pub mod date_parser;
pub mod normalize;
pub mod utils;

pub use classify::{candidates, classify};
pub use normalize::{normalize, NormalizeSummary};

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
const PREFERRED_ZIP_ENTRY: &str = "metadata.csv";

static NULL: Value = Value::Null;

/// A single loosely typed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Best-effort coercion of a raw CSV field.
    pub fn infer(raw: &str) -> Self {
        let v = utils::clean_str(raw);
        if utils::is_na(&v) {
            return Value::Null;
        }
        if let Ok(i) = v.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = v.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }
        Value::Text(v)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Result of parsing one date cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Valid(NaiveDateTime),
    Unparseable,
}

impl ParsedDate {
    pub fn valid(&self) -> Option<NaiveDateTime> {
        match self {
            ParsedDate::Valid(dt) => Some(*dt),
            ParsedDate::Unparseable => None,
        }
    }
}

/// The two columns attached by the normalizer.
#[derive(Debug, Clone)]
pub struct DerivedColumns {
    /// Source column the dates were parsed from.
    pub source_column: String,
    pub dates: Vec<ParsedDate>,
    pub years: Vec<Option<i32>>,
}

#[derive(Debug, Clone)]
pub struct RecordTable {
    pub columns: Vec<String>,
    /// One `Vec<Value>` per record, always `columns.len()` wide.
    pub rows: Vec<Vec<Value>>,
    derived: Option<DerivedColumns>,
}

impl RecordTable {
    /// Rows are padded with nulls or truncated to the header width.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        for row in rows.iter_mut().filter(|r| r.len() != width) {
            row.resize(width, Value::Null);
        }
        Self {
            columns,
            rows,
            derived: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| cell(r, idx)))
    }

    pub fn derived(&self) -> Option<&DerivedColumns> {
        self.derived.as_ref()
    }

    pub fn years(&self) -> Option<&[Option<i32>]> {
        self.derived.as_ref().map(|d| d.years.as_slice())
    }

    pub(crate) fn attach_derived(&mut self, derived: DerivedColumns) {
        debug_assert_eq!(derived.dates.len(), self.rows.len());
        debug_assert_eq!(derived.years.len(), self.rows.len());
        self.derived = Some(derived);
    }
}

/// Cell `idx` of `row`, or null when the row is too short.
pub(crate) fn cell(row: &[Value], idx: usize) -> &Value {
    row.get(idx).unwrap_or(&NULL)
}

/// Read a headed CSV stream into a table, stopping after `row_cap` records.
pub fn read_records<R: Read>(reader: R, row_cap: Option<usize>) -> Result<RecordTable, AcquisitionError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(AcquisitionError::NotTabular("missing header row".into()));
    }
    if looks_like_html(&columns) {
        return Err(AcquisitionError::NotTabular(
            "received an HTML page instead of CSV".into(),
        ));
    }

    let width = columns.len();
    let cap = row_cap.unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    let mut warned_wide = false;

    for (idx, result) in rdr.records().take(cap).enumerate() {
        let record = result?;
        if record.len() > width && !warned_wide {
            warn!(
                record = idx,
                fields = record.len(),
                headers = width,
                "row has more fields than headers; extra fields dropped"
            );
            warned_wide = true;
        }
        let mut row: Vec<Value> = record.iter().take(width).map(Value::infer).collect();
        row.resize(width, Value::Null);
        rows.push(row);
    }

    debug!(columns = width, rows = rows.len(), "read CSV records");
    Ok(RecordTable::new(columns, rows))
}

/// Load a local CSV file, or the CSV inside a zip archive.
pub fn load_file<P: AsRef<Path>>(path: P, row_cap: Option<usize>) -> Result<RecordTable, AcquisitionError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let mut magic = [0u8; 4];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    if n == 4 && &magic == ZIP_MAGIC {
        debug!(path = %path.display(), "reading zip archive");
        return load_zip(file, row_cap);
    }
    read_records(file, row_cap)
}

fn load_zip(file: File, row_cap: Option<usize>) -> Result<RecordTable, AcquisitionError> {
    let mut archive = ZipArchive::new(file)?;

    let mut first_csv = None;
    let mut preferred = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if !entry.is_file() || !name.to_lowercase().ends_with(".csv") {
            continue;
        }
        let base = name.rsplit('/').next().unwrap_or(&name).to_lowercase();
        if base == PREFERRED_ZIP_ENTRY {
            preferred = Some(i);
            break;
        }
        first_csv.get_or_insert(i);
    }

    let idx = preferred.or(first_csv).ok_or_else(|| {
        AcquisitionError::NotTabular("zip archive contains no .csv entry".into())
    })?;
    let entry = archive.by_index(idx)?;
    debug!(entry = entry.name(), "selected zip entry");
    read_records(entry, row_cap)
}

fn looks_like_html(columns: &[String]) -> bool {
    columns
        .first()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            c.starts_with("<!doctype html") || c.starts_with("<html")
        })
        .unwrap_or(false)
}
