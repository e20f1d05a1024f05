//! Immutable in-memory table loaded from CSV

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::Path;

use super::{ColumnKind, read_csv};

/// A header plus text rows; every operation returns a new frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataFrame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(anyhow!(
                "Row {} has {} cells, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            ));
        }
        Ok(Self { columns, rows })
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let table = read_csv(path)?;
        Self::new(table.columns, table.rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a column by exact name, falling back to a case-insensitive match
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| {
                anyhow!(
                    "Unknown column '{}'. Available columns: {}",
                    name,
                    self.columns.join(", ")
                )
            })
    }

    pub fn column_kind(&self, index: usize) -> ColumnKind {
        ColumnKind::infer(self.rows.iter().map(|r| r[index].as_str()))
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> DataFrame {
        DataFrame {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Rows whose `column` contains `needle`, ignoring case
    pub fn filter_contains(&self, column: &str, needle: &str) -> Result<DataFrame> {
        let idx = self.column_index(column)?;
        let needle = needle.to_lowercase();
        Ok(DataFrame {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r[idx].to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        })
    }

    /// Stable sort by `column`. Numeric columns sort by value, others
    /// lexically; empty cells always go last.
    pub fn sort_by(&self, column: &str, descending: bool) -> Result<DataFrame> {
        let idx = self.column_index(column)?;
        let numeric = self.column_kind(idx).is_numeric();

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            let (x, y) = (a[idx].trim(), b[idx].trim());
            match (x.is_empty(), y.is_empty()) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                (false, false) => {}
            }
            let ord = if numeric {
                let (x, y) = (x.parse::<f64>(), y.parse::<f64>());
                match (x, y) {
                    (Ok(x), Ok(y)) => x.total_cmp(&y),
                    _ => Ordering::Equal,
                }
            } else {
                x.to_lowercase().cmp(&y.to_lowercase())
            };
            if descending { ord.reverse() } else { ord }
        });

        Ok(DataFrame {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Distinct non-empty values of `column`, in first-seen order
    pub fn unique(&self, column: &str) -> Result<Vec<String>> {
        let idx = self.column_index(column)?;
        let mut seen = std::collections::HashSet::new();
        Ok(self
            .rows
            .iter()
            .map(|r| r[idx].trim())
            .filter(|v| !v.is_empty() && seen.insert(*v))
            .map(String::from)
            .collect())
    }

    /// Shape and per-column kind / non-null counts
    pub fn describe(&self) -> String {
        let mut out = format!("{} rows x {} columns\n", self.len(), self.columns.len());
        for (idx, name) in self.columns.iter().enumerate() {
            let non_null = self
                .rows
                .iter()
                .filter(|r| !r[idx].trim().is_empty())
                .count();
            let kind = match self.column_kind(idx) {
                ColumnKind::Integer => "integer",
                ColumnKind::Real => "float",
                ColumnKind::Text => "text",
            };
            out.push_str(&format!("- {} ({}, {} non-null)\n", name, kind, non_null));
        }
        out
    }

    /// Pipe-separated rendering with a header line
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(self.columns.join(" | "));
        lines.extend(self.rows.iter().map(|r| r.join(" | ")));
        lines.join("\n")
    }

    /// The first `n` rows as JSON objects keyed by column, numbers typed
    pub fn records(&self, n: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| (col.clone(), cell_to_json(cell)))
                    .collect()
            })
            .collect()
    }
}

fn cell_to_json(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(cell.to_string())
}
