//! Tabular data backing the agents: SQLite databases and in-memory frames

use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::{debug, warn};

pub mod database;
pub mod frame;

pub use database::SqlDatabase;
pub use frame::DataFrame;

/// Header plus raw text cells of a CSV file. Empty cells stay empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read a CSV file into memory.
///
/// Repeated header names are made unique by suffixing `.1`, `.2` and so on,
/// and blank headers become `Unnamed: {index}`. Short rows are padded with
/// empty cells; cells past the header width are dropped.
pub fn read_csv(path: &Path) -> Result<CsvTable> {
    if !path.exists() {
        bail!("CSV file not found: {}", path.display());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header of {}", path.display()))?;
    let columns = unique_columns(headers.iter());
    let width = columns.len();

    let mut rows = Vec::new();
    let mut overflow = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Failed to read row {} of {}", line + 1, path.display()))?;
        if record.len() > width {
            overflow += 1;
        }
        let mut row: Vec<String> = record.iter().take(width).map(String::from).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    if overflow > 0 {
        warn!(
            "{} row(s) in {} had more cells than the header; extra cells dropped",
            overflow,
            path.display()
        );
    }
    debug!(
        "Read {} rows x {} columns from {}",
        rows.len(),
        width,
        path.display()
    );
    Ok(CsvTable { columns, rows })
}

fn unique_columns<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for (index, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            header.to_string()
        };
        let mut name = base.clone();
        let mut suffix = 0;
        while columns.contains(&name) {
            suffix += 1;
            name = format!("{}.{}", base, suffix);
        }
        columns.push(name);
    }
    columns
}

/// Storage class inferred from a column's non-empty cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut kind = ColumnKind::Integer;
        let mut seen = false;
        for cell in cells {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            seen = true;
            if kind == ColumnKind::Integer && cell.parse::<i64>().is_err() {
                kind = ColumnKind::Real;
            }
            if kind == ColumnKind::Real && cell.parse::<f64>().is_err() {
                return ColumnKind::Text;
            }
        }
        if seen { kind } else { ColumnKind::Text }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// Double-quote an SQL identifier
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
