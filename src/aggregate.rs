// src/aggregate.rs
//! Read-only aggregates over a normalized `RecordTable`.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::process::{cell, RecordTable, Value};

/// Records per derived year, ascending. `None` if the table was never normalized.
pub fn year_counts(table: &RecordTable) -> Option<BTreeMap<i32, usize>> {
    let years = table.years()?;
    let mut out = BTreeMap::new();
    for year in years.iter().flatten() {
        *out.entry(*year).or_insert(0) += 1;
    }
    Some(out)
}

/// Distinct derived years, ascending.
pub fn available_years(table: &RecordTable) -> Vec<i32> {
    year_counts(table)
        .map(|m| m.into_keys().collect())
        .unwrap_or_default()
}

/// The `k` most frequent non-null values of `column`, by descending count.
/// Equal counts keep the order in which the values first appeared.
pub fn top_k(table: &RecordTable, column: &str, k: usize) -> Result<Vec<(String, usize)>> {
    let cells = table
        .column(column)
        .ok_or_else(|| Error::MissingCategoricalColumn(column.to_string()))?;

    // value -> position in `counts`, which is kept in first-seen order
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for cell in cells.filter(|c| !c.is_null()) {
        let key = cell.to_string();
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    // stable sort keeps first-seen order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(k);
    Ok(counts)
}

/// Records published in one year.
#[derive(Debug, Clone, Serialize)]
pub struct YearSlice<'a> {
    pub year: i32,
    /// Matches before truncation.
    pub total: usize,
    /// Indices into `table.rows`, in original order.
    pub indices: Vec<usize>,
    #[serde(skip)]
    table: &'a RecordTable,
}

impl<'a> YearSlice<'a> {
    pub fn rows(&self) -> impl Iterator<Item = &'a [Value]> + '_ {
        let table = self.table;
        self.indices.iter().map(move |&i| table.rows[i].as_slice())
    }

    /// Project the slice onto `columns`, skipping names the table lacks.
    pub fn project(&self, columns: &[String]) -> (Vec<String>, Vec<Vec<&'a Value>>) {
        let picked: Vec<(String, usize)> = columns
            .iter()
            .filter_map(|c| self.table.column_index(c).map(|i| (c.clone(), i)))
            .collect();
        let rows = self
            .rows()
            .map(|row| picked.iter().map(|(_, i)| cell(row, *i)).collect())
            .collect();
        (picked.into_iter().map(|(c, _)| c).collect(), rows)
    }
}

/// Records whose derived year equals `year`, truncated to `limit` when given.
pub fn filter_year(table: &RecordTable, year: i32, limit: Option<usize>) -> YearSlice<'_> {
    let matching: Vec<usize> = table
        .years()
        .map(|years| {
            years
                .iter()
                .enumerate()
                .filter(|(_, y)| **y == Some(year))
                .map(|(i, _)| i)
                .collect()
        })
        .unwrap_or_default();

    let total = matching.len();
    let mut indices = matching;
    if let Some(limit) = limit {
        indices.truncate(limit);
    }
    YearSlice {
        year,
        total,
        indices,
        table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::normalize;

    fn papers(rows: &[(&str, &str, &str)]) -> RecordTable {
        let mut t = RecordTable::new(
            vec!["title".into(), "journal".into(), "publish_time".into()],
            rows.iter()
                .map(|(t, j, d)| vec![Value::infer(t), Value::infer(j), Value::infer(d)])
                .collect(),
        );
        normalize(&mut t, "publish_time").unwrap();
        t
    }

    #[test]
    fn year_counts_are_ascending_and_skip_missing() {
        let t = papers(&[
            ("a", "X", "2021-01-01"),
            ("b", "X", "2020-05-05"),
            ("c", "Y", "garbage"),
            ("d", "Y", "2020"),
        ]);
        let counts = year_counts(&t).unwrap();
        assert_eq!(counts.into_iter().collect::<Vec<_>>(), vec![(2020, 2), (2021, 1)]);
        assert_eq!(available_years(&t), vec![2020, 2021]);
    }

    #[test]
    fn year_counts_need_normalization() {
        let t = RecordTable::new(vec!["a".into()], vec![vec![Value::Integer(2020)]]);
        assert!(year_counts(&t).is_none());
        assert!(available_years(&t).is_empty());
    }

    #[test]
    fn top_k_breaks_ties_by_first_appearance() {
        let mut rows = Vec::new();
        for j in ["C", "A", "B", "A", "B", "C", "A", "B", "A", "B", "A", "B", "C"] {
            rows.push(("t", j, "2020"));
        }
        // C:3 first seen, A:5, B:5
        let t = papers(&rows);
        let top = top_k(&t, "journal", 2).unwrap();
        assert_eq!(top, vec![("A".to_string(), 5), ("B".to_string(), 5)]);

        let all = top_k(&t, "journal", 10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], ("C".to_string(), 3));
    }

    #[test]
    fn top_k_ignores_nulls_and_reports_missing_columns() {
        let t = papers(&[("a", "", "2020"), ("b", "Lancet", "2020"), ("c", "NaN", "2020")]);
        assert_eq!(top_k(&t, "journal", 10).unwrap(), vec![("Lancet".to_string(), 1)]);
        assert!(matches!(
            top_k(&t, "venue", 10),
            Err(Error::MissingCategoricalColumn(c)) if c == "venue"
        ));
    }

    #[test]
    fn filter_year_is_exact_ordered_and_truncated() {
        let t = papers(&[
            ("a", "X", "2020-01-01"),
            ("b", "X", "2019-01-01"),
            ("c", "Y", "2020-06-01"),
            ("d", "Y", "bad"),
            ("e", "Z", "2020"),
        ]);
        let slice = filter_year(&t, 2020, None);
        assert_eq!(slice.total, 3);
        assert_eq!(slice.indices, vec![0, 2, 4]);

        let slice = filter_year(&t, 2020, Some(2));
        assert_eq!(slice.total, 3);
        let titles: Vec<String> = slice.rows().map(|r| r[0].to_string()).collect();
        assert_eq!(titles, vec!["a", "c"]);

        assert_eq!(filter_year(&t, 1999, Some(20)).total, 0);
    }

    #[test]
    fn projection_keeps_known_columns_only() {
        let t = papers(&[("a", "X", "2020")]);
        let slice = filter_year(&t, 2020, None);
        let wanted = vec!["title".to_string(), "abstract".into(), "publish_time".into()];
        let (cols, rows) = slice.project(&wanted);
        assert_eq!(cols, vec!["title", "publish_time"]);
        assert_eq!(rows[0][0], &Value::Text("a".into()));
        assert_eq!(rows[0][1], &Value::Integer(2020));
    }
}
