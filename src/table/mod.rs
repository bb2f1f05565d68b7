// src/table/mod.rs

use std::collections::{BTreeMap, HashMap};

use crate::fetch::Point;

/// Row key of the wide table: (ISO alpha-3 country code, year).
pub type RowKey = (String, i32);

/// A wide per-(country, year) table with one column per indicator plus
/// derived and lagged columns.
///
/// Rows live in a `BTreeMap`, so (country, year) pairs are unique by
/// construction and iteration is sorted by country then ascending year,
/// the order lag computation depends on. A column value that is absent
/// from a row's map is null.
///
/// `columns` is the registry of data columns in insertion order; a column
/// exists in the table's schema only once something registered it, which
/// is how "a failed indicator's column is entirely absent" falls out.
#[derive(Debug, Default, Clone)]
pub struct WideTable {
    columns: Vec<String>,
    rows: BTreeMap<RowKey, HashMap<String, f64>>,
}

impl WideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Data columns, in their current (insertion or selected) order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn get(&self, country: &str, year: i32, column: &str) -> Option<f64> {
        self.rows
            .get(&(country.to_string(), year))
            .and_then(|row| row.get(column).copied())
    }

    /// Rows in (country, ascending year) order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (&RowKey, &HashMap<String, f64>)> {
        self.rows.iter()
    }

    fn ensure_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Full outer join of one indicator series on (country, year): every
    /// year in the series gets a row even if no other indicator covers
    /// it, and existing rows gain the new column where a value exists.
    /// Null-valued points still materialize their row.
    pub fn merge_series(&mut self, country: &str, column: &str, points: &[Point]) {
        self.ensure_column(column);
        for point in points {
            let row = self
                .rows
                .entry((country.to_string(), point.year))
                .or_default();
            if let Some(value) = point.value {
                row.insert(column.to_string(), value);
            }
        }
    }

    /// Stack another table's rows onto this one (column union, no join).
    pub fn concat(&mut self, other: WideTable) {
        for column in &other.columns {
            self.ensure_column(column);
        }
        for (key, row) in other.rows {
            self.rows.entry(key).or_default().extend(row);
        }
    }

    /// Drop rows earlier than `min_year`.
    pub fn retain_years_from(&mut self, min_year: i32) {
        self.rows.retain(|(_, year), _| *year >= min_year);
    }

    /// Row-wise unary derivation `dst = f(src)`. The target column is
    /// registered even when `src` is missing entirely, so the output
    /// schema stays stable; `f` returning `None` leaves the cell null.
    pub fn map_column(&mut self, src: &str, dst: &str, f: impl Fn(f64) -> Option<f64>) {
        self.ensure_column(dst);
        for row in self.rows.values_mut() {
            if let Some(&input) = row.get(src) {
                if let Some(output) = f(input) {
                    row.insert(dst.to_string(), output);
                }
            }
        }
    }

    /// Row-wise binary derivation `dst = f(a, b)` where both inputs are
    /// present; the target column is always registered.
    pub fn zip_columns(&mut self, a: &str, b: &str, dst: &str, f: impl Fn(f64, f64) -> f64) {
        self.ensure_column(dst);
        for row in self.rows.values_mut() {
            if let (Some(&left), Some(&right)) = (row.get(a), row.get(b)) {
                row.insert(dst.to_string(), f(left, right));
            }
        }
    }

    /// Add `<base>_lag1`: within each country, in ascending year order,
    /// the lag at row t is the base value at row t−1. The first row of
    /// each country has a null lag; a missing base column yields a
    /// present-but-all-null lag column.
    pub fn add_lag_column(&mut self, base: &str) {
        let lag_name = format!("{base}_lag1");
        self.ensure_column(&lag_name);

        let mut assignments: Vec<(RowKey, f64)> = Vec::new();
        let mut prev_country: Option<&String> = None;
        let mut prev_value: Option<f64> = None;

        for ((country, year), row) in &self.rows {
            let lag = match prev_country {
                Some(prev) if prev == country => prev_value,
                _ => None,
            };
            if let Some(value) = lag {
                assignments.push(((country.clone(), *year), value));
            }
            prev_value = row.get(base).copied();
            prev_country = Some(country);
        }

        for (key, value) in assignments {
            if let Some(row) = self.rows.get_mut(&key) {
                row.insert(lag_name.clone(), value);
            }
        }
    }

    /// Reorder columns to `order`, keeping only those that exist.
    pub fn select_columns(&mut self, order: &[&str]) {
        self.columns = order
            .iter()
            .filter(|name| self.has_column(name))
            .map(|name| name.to_string())
            .collect();
    }
}
