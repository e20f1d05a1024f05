//! SQLite database shared by the SQL-backed agents

use anyhow::{Context, Result, bail};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Batch, Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{ColumnKind, quote_ident, read_csv};

/// Rows returned to the model from a single query
pub const MAX_QUERY_ROWS: usize = 100;

/// Sample rows shown next to each table's DDL
const SCHEMA_SAMPLE_ROWS: usize = 3;

/// SQLite database wrapper (thread-safe via Arc<Mutex>)
#[derive(Clone)]
pub struct SqlDatabase {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqlDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlDatabase")
            .field("path", &self.path)
            .finish()
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| {
        warn!("Database mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl SqlDatabase {
    /// Open (or create) a database file, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        info!("Opened database at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run setup statements (DDL) synchronously
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        lock(&self.conn)
            .execute_batch(sql)
            .context("Failed to execute SQL batch")
    }

    /// Replace `table` with the contents of a CSV file.
    ///
    /// Column types are inferred from the data (INTEGER, REAL or TEXT) and
    /// empty cells become NULL. Returns the number of imported rows.
    pub fn import_csv(&self, csv_path: &Path, table: &str) -> Result<usize> {
        let csv = read_csv(csv_path)?;
        let mut conn = lock(&self.conn);

        let kinds: Vec<ColumnKind> = (0..csv.columns.len())
            .map(|i| ColumnKind::infer(csv.rows.iter().map(|r| r[i].as_str())))
            .collect();

        let column_defs = csv
            .columns
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| format!("{} {}", quote_ident(name), kind.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; csv.columns.len()].join(", ");
        let table_ident = quote_ident(table);

        let tx = conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({column_defs});"
        ))
        .with_context(|| format!("Failed to create table {}", table))?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {table_ident} VALUES ({placeholders})"
            ))?;
            for row in &csv.rows {
                insert.execute(params_from_iter(
                    row.iter().zip(&kinds).map(|(cell, kind)| to_sql_value(cell, *kind)),
                ))?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to import CSV into {}", table))?;

        info!(
            "Loaded {} records into {} from {}",
            csv.rows.len(),
            table,
            csv_path.display()
        );
        Ok(csv.rows.len())
    }

    /// Ensure `table` exists via `ddl`, then replace its contents from the
    /// CSV when the file is present. Returns the number of imported rows.
    pub fn load_table(&self, ddl: &str, csv_path: &Path, table: &str) -> Result<usize> {
        self.execute_batch(ddl)?;
        if csv_path.exists() {
            self.import_csv(csv_path, table)
        } else {
            warn!("CSV not found for table {}: {}", table, csv_path.display());
            Ok(0)
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            f(&conn)
        })
        .await
        .context("spawn_blocking task panicked")?
    }

    /// User tables, sorted by name
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
        .await
    }

    /// DDL plus a few sample rows for each table
    pub async fn table_info(&self, tables: Vec<String>) -> Result<String> {
        self.with_conn(move |conn| {
            let mut sections = Vec::with_capacity(tables.len());
            for table in &tables {
                let ddl: Option<String> = conn
                    .query_row(
                        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        params![table],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(ddl) = ddl else {
                    bail!("Table '{}' not found", table);
                };

                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM {} LIMIT {}",
                    quote_ident(table),
                    SCHEMA_SAMPLE_ROWS
                ))?;
                let header = stmt
                    .column_names()
                    .into_iter()
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .join("\t");
                let width = stmt.column_count();
                let samples = stmt
                    .query_map([], |row| {
                        (0..width)
                            .map(|i| row.get_ref(i).map(render_plain))
                            .collect::<rusqlite::Result<Vec<_>>>()
                            .map(|cells| cells.join("\t"))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                sections.push(format!(
                    "{}\n\n/*\n{} rows from {} table:\n{}\n{}\n*/",
                    ddl.trim(),
                    SCHEMA_SAMPLE_ROWS,
                    table,
                    header,
                    samples.join("\n")
                ));
            }
            Ok(sections.join("\n\n"))
        })
        .await
    }

    /// Run one SQL statement.
    ///
    /// Statements producing columns return their rows rendered as tuples
    /// (at most [`MAX_QUERY_ROWS`]); anything else reports the number of
    /// affected rows. Exactly one statement is accepted per call.
    pub async fn run_sql(&self, sql: String) -> Result<String> {
        self.with_conn(move |conn| {
            let mut batch = Batch::new(conn, sql.trim());
            let Some(mut stmt) = batch.next()? else {
                bail!("Query cannot be empty");
            };
            if batch.next()?.is_some() {
                bail!("You can only execute one statement at a time.");
            }

            let width = stmt.column_count();

            if width == 0 {
                let affected = stmt.execute([])?;
                debug!("SQL statement affected {} rows", affected);
                return Ok(format!("Statement executed. {} row(s) affected.", affected));
            }

            let mut rows = stmt.query([])?;
            let mut rendered = Vec::new();
            let mut truncated = false;
            while let Some(row) = rows.next()? {
                if rendered.len() == MAX_QUERY_ROWS {
                    truncated = true;
                    break;
                }
                let cells = (0..width)
                    .map(|i| row.get_ref(i).map(render_literal))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rendered.push(format!("({})", cells.join(", ")));
            }

            if rendered.is_empty() {
                return Ok("No rows returned.".to_string());
            }
            let mut out = format!("[{}]", rendered.join(", "));
            if truncated {
                out.push_str(&format!("\n[Truncated to {} rows]", MAX_QUERY_ROWS));
            }
            Ok(out)
        })
        .await
    }

    /// Count rows in a table
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        self.with_conn(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
            .await
    }
}

fn to_sql_value(cell: &str, kind: ColumnKind) -> SqlValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return SqlValue::Null;
    }
    match kind {
        ColumnKind::Integer => trimmed
            .parse()
            .map_or_else(|_| SqlValue::Text(cell.to_string()), SqlValue::Integer),
        ColumnKind::Real => trimmed
            .parse()
            .map_or_else(|_| SqlValue::Text(cell.to_string()), SqlValue::Real),
        ColumnKind::Text => SqlValue::Text(cell.to_string()),
    }
}

/// Value as an SQL-ish literal: strings quoted, NULL spelled out
fn render_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t).replace('\'', "''")),
        other => render_plain(other),
    }
}

fn render_plain(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn slots_db(dir: &TempDir) -> SqlDatabase {
        let csv = write_csv(
            dir,
            "slots.csv",
            "id,doctor_id,datetime,is_available\n1,7,2024-08-01 15:00,1\n2,7,2024-08-01 16:00,0\n3,9,2024-08-02 09:30,1\n",
        );
        let db = SqlDatabase::open(dir.path().join("nested/appointments.db")).unwrap();
        db.import_csv(&csv, "slots").unwrap();
        db
    }

    #[tokio::test]
    async fn test_import_infers_types() {
        let dir = TempDir::new().unwrap();
        let db = slots_db(&dir);

        let out = db
            .run_sql("SELECT typeof(id), typeof(datetime) FROM slots LIMIT 1".to_string())
            .await
            .unwrap();
        assert_eq!(out, "[('integer', 'text')]");
        assert_eq!(db.row_count("slots").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_import_replaces_existing_table() {
        let dir = TempDir::new().unwrap();
        let db = slots_db(&dir);
        let csv = write_csv(&dir, "slots2.csv", "id,doctor_id,datetime,is_available\n9,1,x,1\n");
        assert_eq!(db.import_csv(&csv, "slots").unwrap(), 1);
        assert_eq!(db.row_count("slots").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_cells_become_null() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "er.csv",
            "zip_code,hospital_name,ambulance_available\n10001,Mercy General,\n",
        );
        let db = SqlDatabase::open_in_memory().unwrap();
        db.import_csv(&csv, "emergency_directory").unwrap();
        let out = db
            .run_sql("SELECT zip_code, ambulance_available FROM emergency_directory".to_string())
            .await
            .unwrap();
        assert_eq!(out, "[(10001, NULL)]");
    }

    #[tokio::test]
    async fn test_import_duplicate_headers_and_short_rows() {
        let dir = TempDir::new().unwrap();
        let csv = write_csv(
            &dir,
            "doctors.csv",
            "id,name,name,specialty\n1,Elizabeth Moore,Liz,Cardiology\n2,Raj Patel\n",
        );
        let db = SqlDatabase::open_in_memory().unwrap();
        assert_eq!(db.import_csv(&csv, "doctors").unwrap(), 2);

        let out = db
            .run_sql("SELECT \"name.1\", specialty FROM doctors ORDER BY id".to_string())
            .await
            .unwrap();
        assert_eq!(out, "[('Liz', 'Cardiology'), (NULL, NULL)]");
    }

    #[tokio::test]
    async fn test_load_table_without_csv_keeps_schema() {
        let dir = TempDir::new().unwrap();
        let db = SqlDatabase::open_in_memory().unwrap();
        let rows = db
            .load_table(
                "CREATE TABLE IF NOT EXISTS doctors (id INTEGER, name TEXT NOT NULL)",
                &dir.path().join("missing.csv"),
                "doctors",
            )
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(db.list_tables().await.unwrap(), vec!["doctors"]);
    }

    #[tokio::test]
    async fn test_list_tables_and_info() {
        let dir = TempDir::new().unwrap();
        let db = slots_db(&dir);
        db.execute_batch("CREATE TABLE doctors (id INTEGER, name TEXT)")
            .unwrap();

        assert_eq!(db.list_tables().await.unwrap(), vec!["doctors", "slots"]);

        let info = db.table_info(vec!["slots".to_string()]).await.unwrap();
        assert!(info.starts_with("CREATE TABLE \"slots\""));
        assert!(info.contains("3 rows from slots table:"));
        assert!(info.contains("id\tdoctor_id\tdatetime\tis_available"));
        assert!(info.contains("1\t7\t2024-08-01 15:00\t1"));

        let err = db
            .table_info(vec!["appointments".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Table 'appointments' not found");
    }

    #[tokio::test]
    async fn test_write_statement_reports_affected_rows() {
        let dir = TempDir::new().unwrap();
        let db = slots_db(&dir);
        let out = db
            .run_sql("DELETE FROM slots WHERE doctor_id = 7".to_string())
            .await
            .unwrap();
        assert_eq!(out, "Statement executed. 2 row(s) affected.");
        assert_eq!(db.row_count("slots").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_multiple_statements_rejected() {
        let dir = TempDir::new().unwrap();
        let db = slots_db(&dir);

        let err = db
            .run_sql("DELETE FROM slots WHERE id = 1; DELETE FROM slots WHERE id = 2".to_string())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You can only execute one statement at a time.");
        assert_eq!(db.row_count("slots").await.unwrap(), 3);

        assert!(db.run_sql("SELECT 1; DROP TABLE slots".to_string()).await.is_err());
        assert_eq!(db.list_tables().await.unwrap(), vec!["slots"]);

        // A trailing terminator is still a single statement
        let out = db
            .run_sql("SELECT COUNT(*) FROM slots;  ".to_string())
            .await
            .unwrap();
        assert_eq!(out, "[(3)]");
    }

    #[tokio::test]
    async fn test_query_row_cap() {
        let db = SqlDatabase::open_in_memory().unwrap();
        let out = db
            .run_sql(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 150)
                 SELECT x FROM n"
                    .to_string(),
            )
            .await
            .unwrap();
        assert!(out.contains("(100)"));
        assert!(!out.contains("(101)"));
        assert!(out.ends_with("[Truncated to 100 rows]"));
    }

    #[tokio::test]
    async fn test_query_errors_and_empty_results() {
        let db = SqlDatabase::open_in_memory().unwrap();
        assert!(db.run_sql("SELECT * FROM nope".to_string()).await.is_err());
        assert!(db.run_sql("   ".to_string()).await.is_err());
        db.execute_batch("CREATE TABLE t (a TEXT)").unwrap();
        assert_eq!(
            db.run_sql("SELECT a FROM t".to_string()).await.unwrap(),
            "No rows returned."
        );
    }

    #[test]
    fn test_render_literal() {
        assert_eq!(render_literal(ValueRef::Text(b"O'Neil")), "'O''Neil'");
        assert_eq!(render_literal(ValueRef::Integer(3)), "3");
        assert_eq!(render_literal(ValueRef::Null), "NULL");
    }
}
