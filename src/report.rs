// src/report.rs
//! Terminal and JSON rendering of a `Dashboard`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::aggregate::YearSlice;
use crate::explorer::{Dashboard, Status};
use crate::process::utils::truncate_display;
use crate::process::{NormalizeSummary, Value};

const CELL_WIDTH: usize = 28;
const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 36;

/// Render a small text table.
pub fn render_table<'a, R, C>(columns: &[String], rows: R) -> String
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = &'a Value>,
{
    let body: Vec<Vec<String>> = rows
        .into_iter()
        .map(|r| {
            r.into_iter()
                .map(|v| truncate_display(&v.to_string(), CELL_WIDTH))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns
        .iter()
        .map(|c| truncate_display(c, CELL_WIDTH).chars().count())
        .collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad(&truncate_display(c, CELL_WIDTH), *w))
        .collect();
    let _ = writeln!(out, "{}", header.join(" | ").trim_end());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &body {
        let cells: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        let _ = writeln!(out, "{}", cells.join(" | ").trim_end());
    }
    out
}

/// Horizontal bar chart, bars scaled to the largest count.
pub fn render_bars<L: AsRef<str>>(title: &str, bars: &[(L, usize)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let max = bars.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if max == 0 {
        let _ = writeln!(out, "  (no data)");
        return out;
    }
    let label_w = bars
        .iter()
        .map(|(l, _)| truncate_display(l.as_ref(), LABEL_WIDTH).chars().count())
        .max()
        .unwrap_or(0);
    for (label, n) in bars {
        let len = ((*n as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
        let _ = writeln!(
            out,
            "  {} | {} {}",
            pad(&truncate_display(label.as_ref(), LABEL_WIDTH), label_w),
            "#".repeat(len.max(1)),
            n
        );
    }
    out
}

/// The full text dashboard. `year` is the selected filter year, if any.
pub fn render_dashboard(d: &Dashboard, year: Option<i32>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "CORD-19 Metadata Explorer\n");

    for s in &d.statuses {
        let mark = if s.is_warning() { "!" } else { "-" };
        let _ = writeln!(out, "{} {}", mark, s);
    }

    let _ = writeln!(out, "\nDataset Preview");
    out.push_str(&render_table(d.columns(), d.preview()));

    if let Some(counts) = &d.year_counts {
        let bars: Vec<(String, usize)> = counts.iter().map(|(y, n)| (y.to_string(), *n)).collect();
        out.push('\n');
        out.push_str(&render_bars("Number of Papers per Year", &bars));
    }

    if let Some(top) = &d.top_categories {
        out.push('\n');
        let title = format!("Top {} by `{}`", top.len(), d.category_column());
        out.push_str(&render_bars(&title, top));
    }

    if d.year_counts.is_some() {
        out.push('\n');
        match year.or_else(|| d.default_year()).and_then(|y| d.filter_year(y)) {
            Some(slice) => out.push_str(&render_year_slice(d, &slice)),
            None => {
                let _ = writeln!(out, "! {}", Status::NoYearSelected);
            }
        }
    }
    out
}

fn render_year_slice(d: &Dashboard, slice: &YearSlice<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Filter Papers by Year");
    let _ = writeln!(
        out,
        "Showing {} papers published in {}",
        slice.total, slice.year
    );
    let (cols, rows) = slice.project(&d.display_columns());
    out.push_str(&render_table(&cols, rows));
    out
}

/// Machine-readable dashboard.
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub columns: &'a [String],
    pub records: usize,
    pub date_column: Option<&'a str>,
    pub normalize: Option<&'a NormalizeSummary>,
    pub preview: &'a [Vec<Value>],
    pub year_counts: Option<&'a BTreeMap<i32, usize>>,
    pub top_categories: Option<&'a [(String, usize)]>,
    pub statuses: &'a [Status],
    pub selected_year: Option<YearSummary>,
}

#[derive(Debug, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub total: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub fn summary(d: &Dashboard, year: Option<i32>) -> Summary<'_> {
    let selected_year = year
        .or_else(|| d.default_year())
        .and_then(|y| d.filter_year(y))
        .map(|slice| {
            let (columns, rows) = slice.project(&d.display_columns());
            YearSummary {
                year: slice.year,
                total: slice.total,
                columns,
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().cloned().collect())
                    .collect(),
            }
        });
    Summary {
        columns: d.columns(),
        records: d.table.len(),
        date_column: d.date_column.as_deref(),
        normalize: d.normalize.as_ref(),
        preview: d.preview(),
        year_counts: d.year_counts.as_ref(),
        top_categories: d.top_categories.as_deref(),
        statuses: &d.statuses,
        selected_year,
    }
}

fn pad(s: &str, width: usize) -> String {
    let n = s.chars().count();
    if n >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - n))
    }
}
